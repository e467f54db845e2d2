//! The Internet one's-complement checksum (RFC 1071).
//!
//! 16-bit words are summed with 16-bit wraparound, and every carry out of bit 15 is folded
//! back into the sum right away. The checksum is the bitwise complement of that sum.
//! Data carrying a correct checksum sums up to all-ones.

/// Sums the provided words, folding each end-around carry as it occurs, without complementing
pub fn accumulate<I>(words: I) -> u16
where
    I: IntoIterator<Item = u16>,
{
    words.into_iter().fold(0, |acc: u16, word| {
        let sum = acc.wrapping_add(word);

        if sum < acc {
            sum + 1
        } else {
            sum
        }
    })
}

/// Computes the checksum of the provided words
pub fn compute<I>(words: I) -> u16
where
    I: IntoIterator<Item = u16>,
{
    !accumulate(words)
}

/// Returns `true` if the provided words, including a stored checksum, sum up to all-ones
pub fn is_valid<I>(words: I) -> bool
where
    I: IntoIterator<Item = u16>,
{
    accumulate(words) == 0xffff
}

/// Splits a byte slice into big-endian words. An odd trailing byte is padded with zero.
pub fn words(bytes: &[u8]) -> impl Iterator<Item = u16> + '_ {
    bytes.chunks(2).map(|chunk| match *chunk {
        [hi, lo] => u16::from_be_bytes([hi, lo]),
        [hi] => u16::from_be_bytes([hi, 0]),
        _ => 0,
    })
}
