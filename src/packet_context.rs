use std::time::Instant;

#[derive(Debug)]
pub struct PacketContext<T, K> {
    pub msg: T, // packet payload handle
    pub key: K, // peer the packet is buffered for

    pub pkt_len: usize, // service cost in the DRR sense

    // NFQUEUE the packet came from; the verdict has to go back there
    pub queue_num: usize,
    pub arrival_time: Instant,
}

impl<T: AsRef<[u8]>, K> PacketContext<T, K> {
    pub fn new(msg: T, key: K, queue_num: usize) -> Self {
        let pkt_len = msg.as_ref().len();
        Self {
            msg,
            key,
            pkt_len,
            queue_num,
            arrival_time: Instant::now(),
        }
    }
}
