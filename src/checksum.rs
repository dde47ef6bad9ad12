/// Partial Internet checksum of a payload.
///
/// Sums big-endian 16-bit words and folds the carries back into the low 16
/// bits. The result is stored with each payload so the packet assembler can
/// add it to the header sum without rescanning the payload bytes.
///
/// A trailing unpaired byte is added as a low-order value.
pub fn partial_checksum(payload: &[u8]) -> u16 {
    let mut sum: u64 = 0;

    let mut words = payload.chunks_exact(2);
    for word in &mut words {
        sum += ((word[0] as u64) << 8) | word[1] as u64;
    }
    if let [last] = words.remainder() {
        sum += *last as u64;
    }

    while (sum >> 16) > 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }

    sum as u16
}
