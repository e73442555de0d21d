use crate::video::frame::Block;

/// The bit a block carries: the least significant bit of its top-left sample.
pub fn extract_bit(block: &Block) -> u8 {
    block.samples()[0] & 1
}

/// Make `block` carry `bit`.
///
/// If the top-left sample's LSB already equals `bit` the block is left as is;
/// otherwise that one sample is XORed with 1. Returns whether a sample changed.
pub fn embed_bit(block: &mut Block, bit: u8) -> bool {
    let bit = bit & 1;
    if extract_bit(block) == bit {
        return false;
    }
    block.samples_mut()[0] ^= 1;
    true
}
