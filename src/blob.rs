//! Fixed-layout readers over a per-architecture detail blob.
//!
//! Every offset used by the architecture decoders comes from
//! `core::mem::offset_of!` over the `capstone-sys` structs, so a blob is read
//! exactly as the engine laid it out on this target.

use crate::Architecture;

/// Where the operand array and its count live inside one architecture's struct.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ArchLayout {
    pub arch: Architecture,
    /// `size_of` the architecture struct.
    pub size: usize,
    pub op_count: usize,
    pub operands: usize,
    /// `size_of` one operand struct.
    pub stride: usize,
    /// Length of the operand array.
    pub capacity: usize,
}

impl ArchLayout {
    /// Bind `bytes` to this layout.
    ///
    /// # Panics
    /// When the blob is shorter than the architecture struct; that means the
    /// blob came from a different architecture than the caller dispatched on.
    pub fn bind<'a>(&self, bytes: &'a [u8]) -> DetailBlob<'a> {
        assert!(
            bytes.len() >= self.size,
            "{} detail blob is {} bytes, layout needs {}",
            self.arch,
            bytes.len(),
            self.size
        );
        DetailBlob {
            bytes: &bytes[..self.size],
        }
    }

    /// Operand count, clamped to the array capacity.
    pub fn operand_count(&self, blob: &DetailBlob<'_>) -> usize {
        let reported = usize::from(blob.u8(self.op_count));
        if reported > self.capacity {
            log::warn!(
                "{}: op_count {} exceeds capacity {}, clamping",
                self.arch,
                reported,
                self.capacity
            );
            self.capacity
        } else {
            reported
        }
    }

    /// The bytes of operand `index`.
    pub fn operand<'a>(&self, blob: &DetailBlob<'a>, index: usize) -> DetailBlob<'a> {
        debug_assert!(index < self.capacity);
        blob.slice(self.operands + index * self.stride, self.stride)
    }

    /// Every reported operand, in order.
    pub fn operands<'a>(&self, blob: &DetailBlob<'a>) -> impl Iterator<Item = DetailBlob<'a>> {
        let layout = *self;
        let blob = *blob;
        (0..layout.operand_count(&blob)).map(move |index| layout.operand(&blob, index))
    }
}

/// A bounds-checked, native-endian view of a detail region.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DetailBlob<'a> {
    bytes: &'a [u8],
}

impl<'a> DetailBlob<'a> {
    #[cfg(test)]
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    pub fn slice(&self, offset: usize, len: usize) -> DetailBlob<'a> {
        DetailBlob {
            bytes: &self.bytes[offset..offset + len],
        }
    }

    fn array<const N: usize>(&self, offset: usize) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.bytes[offset..offset + N]);
        out
    }

    pub fn bytes<const N: usize>(&self, offset: usize) -> [u8; N] {
        self.array(offset)
    }

    pub fn u8(&self, offset: usize) -> u8 {
        self.bytes[offset]
    }

    pub fn i8(&self, offset: usize) -> i8 {
        i8::from_ne_bytes(self.array(offset))
    }

    pub fn bool(&self, offset: usize) -> bool {
        self.bytes[offset] != 0
    }

    pub fn u16(&self, offset: usize) -> u16 {
        u16::from_ne_bytes(self.array(offset))
    }

    pub fn i16(&self, offset: usize) -> i16 {
        i16::from_ne_bytes(self.array(offset))
    }

    pub fn u32(&self, offset: usize) -> u32 {
        u32::from_ne_bytes(self.array(offset))
    }

    pub fn i32(&self, offset: usize) -> i32 {
        i32::from_ne_bytes(self.array(offset))
    }

    pub fn u64(&self, offset: usize) -> u64 {
        u64::from_ne_bytes(self.array(offset))
    }

    pub fn i64(&self, offset: usize) -> i64 {
        i64::from_ne_bytes(self.array(offset))
    }

    pub fn f64(&self, offset: usize) -> f64 {
        f64::from_ne_bytes(self.array(offset))
    }
}

/*────────────────────────  synthetic blobs for tests  ───────────────────────*/

/// Builds a zeroed blob of a layout's size and pokes fields into it.
#[cfg(test)]
pub(crate) struct BlobWriter {
    pub bytes: Vec<u8>,
}

#[cfg(test)]
impl BlobWriter {
    pub fn new(size: usize) -> Self {
        Self {
            bytes: vec![0; size],
        }
    }

    pub fn put(&mut self, offset: usize, value: &[u8]) -> &mut Self {
        self.bytes[offset..offset + value.len()].copy_from_slice(value);
        self
    }

    pub fn u8(&mut self, offset: usize, value: u8) -> &mut Self {
        self.put(offset, &[value])
    }

    pub fn u16(&mut self, offset: usize, value: u16) -> &mut Self {
        self.put(offset, &value.to_ne_bytes())
    }

    pub fn u32(&mut self, offset: usize, value: u32) -> &mut Self {
        self.put(offset, &value.to_ne_bytes())
    }

    pub fn i32(&mut self, offset: usize, value: i32) -> &mut Self {
        self.put(offset, &value.to_ne_bytes())
    }

    pub fn i64(&mut self, offset: usize, value: i64) -> &mut Self {
        self.put(offset, &value.to_ne_bytes())
    }
}
