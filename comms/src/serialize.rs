use std::io;

/// Writes `self` into a frame body.
pub trait Serialize<'a> {
    /// Serializes the owned part of the frame into `buf`.
    ///
    /// # Arguments
    /// * `buf` - The buffer that already contains the length prefix.
    ///
    /// # Returns
    /// An optional borrowed tail that is written right after `buf`, without copying it.
    fn serialize(&'a self, buf: &mut Vec<u8>) -> io::Result<Option<&'a [u8]>>;
}
