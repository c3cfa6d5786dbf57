//! Fixtures for tests and benches: a writer producing `IIII` integral files.
use std::{io, io::Write, marker::PhantomData};

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};

use crate::integrals::{
    cfour::{MarkerWidth, BATCH_CAPACITY, HEADER_RECORD_LENGTH},
    PackedIndex, SectionLabel,
};

/// 1-based packed index of `(p, q)` as stored on disk.
pub fn pack(p: usize, q: usize) -> i64 {
    PackedIndex::new(p, q).linear() as i64 + 1
}

/// Writes Fortran-unformatted records the way CFOUR lays out `IIII`.
///
/// The header record is written before the first other record.
pub struct IntegralFileWriter<W, B = LittleEndian> {
    inner: W,
    width: MarkerWidth,
    header_written: bool,
    byte_order: PhantomData<B>,
}

impl<W: Write, B: ByteOrder> IntegralFileWriter<W, B> {
    pub fn new(inner: W, width: MarkerWidth) -> Self {
        Self {
            inner,
            width,
            header_written: false,
            byte_order: PhantomData,
        }
    }

    pub fn header(&mut self) -> io::Result<()> {
        if self.header_written {
            return Ok(());
        }
        self.header_written = true;

        let mut payload = vec![b' '; HEADER_RECORD_LENGTH as usize];
        payload[..8].copy_from_slice(b"********");
        payload[8..16].copy_from_slice(b"IIII    ");
        self.write_record(&payload)
    }

    /// Any record, framed by markers.
    pub fn record(&mut self, payload: &[u8]) -> io::Result<()> {
        self.header()?;
        self.write_record(payload)
    }

    pub fn label(&mut self, label: &[u8; 8]) -> io::Result<()> {
        self.record(label)
    }

    /// A batch of at most [`BATCH_CAPACITY`] `(p, q, value)` elements.
    pub fn batch(&mut self, elements: &[(usize, usize, f64)]) -> io::Result<()> {
        assert!(elements.len() <= BATCH_CAPACITY, "batch is too large");

        let values = elements.iter().map(|&(_, _, v)| v).collect::<Vec<_>>();
        let indices = elements
            .iter()
            .map(|&(p, q, _)| pack(p, q))
            .collect::<Vec<_>>();
        self.batch_with_count(&values, &indices, elements.len() as i64)
    }

    /// A batch record with an arbitrary count; unused slots are zero.
    pub fn batch_with_count(&mut self, values: &[f64], indices: &[i64], count: i64) -> io::Result<()> {
        let mut payload = Vec::with_capacity(BATCH_CAPACITY * 16 + 8);

        for slot in 0..BATCH_CAPACITY {
            payload.write_f64::<B>(values.get(slot).copied().unwrap_or(0.0))?;
        }
        for slot in 0..BATCH_CAPACITY {
            payload.write_i64::<B>(indices.get(slot).copied().unwrap_or(0))?;
        }
        payload.write_i64::<B>(count)?;

        self.record(&payload)
    }

    /// The end-of-section batch.
    pub fn sentinel(&mut self) -> io::Result<()> {
        self.batch_with_count(&[], &[], -1)
    }

    pub fn section(
        &mut self,
        label: SectionLabel,
        elements: &[(usize, usize, f64)],
    ) -> io::Result<()> {
        self.section_raw(label.as_bytes(), elements)
    }

    pub fn section_raw(
        &mut self,
        label: &[u8; 8],
        elements: &[(usize, usize, f64)],
    ) -> io::Result<()> {
        self.label(label)?;
        for chunk in elements.chunks(BATCH_CAPACITY) {
            self.batch(chunk)?;
        }
        self.sentinel()
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    fn write_record(&mut self, payload: &[u8]) -> io::Result<()> {
        self.marker(payload.len() as i64)?;
        self.inner.write_all(payload)?;
        self.marker(payload.len() as i64)
    }

    fn marker(&mut self, length: i64) -> io::Result<()> {
        match self.width {
            MarkerWidth::Four => self.inner.write_i32::<B>(length as i32),
            MarkerWidth::Eight => self.inner.write_i64::<B>(length),
        }
    }
}
