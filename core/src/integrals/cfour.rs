//! Reader for `IIII`, the Fortran-unformatted one-electron integral file written by CFOUR.
//!
//! Every record is framed by a leading and a trailing marker holding the payload length. The
//! file starts with a 224 byte header record; the marker width (4 or 8 bytes) is detected from
//! it. Sections consist of an 8 byte label record followed by batch records of
//! [`BATCH_CAPACITY`] values, as many packed indices and a signed count. A negative count closes
//! the section.
use std::{
    fmt,
    io::{Read, Seek, SeekFrom},
    marker::PhantomData,
};

use anyhow::{bail, ensure, Context};
use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use serde::Serialize;
use smallvec::smallvec;

use super::packed::PackedIndex;
use crate::{
    symmetry::nuclear_attraction_plan,
    tensor::{BlockClass, BlockKey, TensorStore},
};

pub const HEADER_RECORD_LENGTH: i64 = 224;
pub const BATCH_CAPACITY: usize = 600;
pub const LABEL_RECORD_LENGTH: i64 = 8;
pub const BATCH_RECORD_LENGTH: i64 = BATCH_CAPACITY as i64 * 16 + 8;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MarkerWidth {
    Four,
    Eight,
}

impl MarkerWidth {
    pub fn bytes(self) -> i64 {
        match self {
            Self::Four => 4,
            Self::Eight => 8,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum SectionLabel {
    Overlap,
    OneElectronHamiltonian,
    Kinetic,
}

impl SectionLabel {
    pub fn from_bytes(label: &[u8; 8]) -> Option<Self> {
        match label {
            b"OVERLAP " => Some(Self::Overlap),
            b"ONEHAMIL" => Some(Self::OneElectronHamiltonian),
            b"KINETINT" => Some(Self::Kinetic),
            _ => None,
        }
    }

    pub fn as_bytes(self) -> &'static [u8; 8] {
        match self {
            Self::Overlap => b"OVERLAP ",
            Self::OneElectronHamiltonian => b"ONEHAMIL",
            Self::Kinetic => b"KINETINT",
        }
    }

    /// The tensor a section is loaded into.
    pub fn destination(self) -> BlockClass {
        match self {
            Self::Overlap => BlockClass::Overlap,
            Self::OneElectronHamiltonian => BlockClass::OneElectronHamiltonian,
            Self::Kinetic => BlockClass::Kinetic,
        }
    }
}

impl fmt::Display for SectionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(self.as_bytes()))
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ParserState {
    AwaitingSectionHeader,
    ReadingLabel,
    ReadingBatch(SectionLabel),
    SectionDone(SectionLabel),
}

/// What a decoding pass went through.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DecodeSummary {
    pub sections: Vec<SectionLabel>,
    pub ignored_sections: usize,
    pub batches: usize,
    pub integrals: usize,
    pub skipped_records: usize,
    pub discarded_batches: usize,
    pub truncated: bool,
}

pub struct IntegralFileReader<R, B = LittleEndian> {
    reader: R,
    width: MarkerWidth,
    length: u64,
    truncated: bool,
    byte_order: PhantomData<B>,
}

impl<R: Read + Seek, B: ByteOrder> IntegralFileReader<R, B> {
    /// Wraps a stream positioned anywhere, detecting the marker width from the header record and
    /// moving past it.
    pub fn new(mut reader: R) -> anyhow::Result<Self> {
        let length = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;

        let mut header = [0u8; 8];
        reader
            .read_exact(&mut header)
            .context("integral file is too short to hold a header")?;

        let width = if B::read_i64(&header) == HEADER_RECORD_LENGTH {
            MarkerWidth::Eight
        } else if i64::from(B::read_i32(&header[..4])) == HEADER_RECORD_LENGTH {
            MarkerWidth::Four
        } else {
            bail!("integral file does not start with a {HEADER_RECORD_LENGTH} byte header record")
        };
        log::debug!("integral file of {length} bytes uses {width:?} byte record markers");

        let header_span = (HEADER_RECORD_LENGTH + 2 * width.bytes()) as u64;
        ensure!(length >= header_span, "integral file ends inside its header");
        reader.seek(SeekFrom::Start(header_span))?;

        Ok(Self {
            reader,
            width,
            length,
            truncated: false,
            byte_order: PhantomData,
        })
    }

    pub fn width(&self) -> MarkerWidth {
        self.width
    }

    /// Streams every recognised section into its destination block of an `n_orbitals` square
    /// tensor. Destination blocks must already be declared.
    ///
    /// Each batch is handed to the store in a single [`TensorStore::write_remote_data`] call.
    pub fn decode<S: TensorStore>(
        &mut self,
        n_orbitals: usize,
        store: &mut S,
    ) -> anyhow::Result<DecodeSummary> {
        let mut summary = DecodeSummary::default();
        let mut values = vec![0.0; BATCH_CAPACITY];
        let mut indices = vec![0i64; BATCH_CAPACITY];
        let mut pairs = Vec::with_capacity(2 * BATCH_CAPACITY);

        let mut state = ParserState::AwaitingSectionHeader;
        loop {
            state = match state {
                ParserState::AwaitingSectionHeader => match self.marker()? {
                    None => break,
                    Some(LABEL_RECORD_LENGTH) => ParserState::ReadingLabel,
                    Some(size) => {
                        summary.skipped_records += 1;
                        if !self.skip(size)? {
                            break;
                        }
                        ParserState::AwaitingSectionHeader
                    }
                },
                ParserState::ReadingLabel => {
                    let Some(label) = self.label()? else {
                        break;
                    };
                    match SectionLabel::from_bytes(&label) {
                        Some(section) => {
                            log::debug!("reading section {section}");
                            summary.sections.push(section);
                            ParserState::ReadingBatch(section)
                        }
                        None => {
                            log::debug!(
                                "skipping section {:?}",
                                String::from_utf8_lossy(&label)
                            );
                            summary.ignored_sections += 1;
                            ParserState::AwaitingSectionHeader
                        }
                    }
                }
                ParserState::ReadingBatch(section) => match self.marker()? {
                    None => {
                        log::warn!("integral file ends inside section {section}");
                        break;
                    }
                    Some(BATCH_RECORD_LENGTH) => {
                        let Some(count) = self.batch(&mut values, &mut indices)? else {
                            break;
                        };

                        if count < 0 {
                            ParserState::SectionDone(section)
                        } else if count as usize > BATCH_CAPACITY {
                            log::warn!(
                                "discarding batch of section {section} claiming {count} integrals"
                            );
                            summary.discarded_batches += 1;
                            ParserState::ReadingBatch(section)
                        } else {
                            let count = count as usize;
                            unpack_batch(
                                n_orbitals,
                                &values[..count],
                                &indices[..count],
                                &mut pairs,
                            )
                            .with_context(|| format!("malformed batch in section {section}"))?;

                            store.write_remote_data(
                                &BlockKey::spatial(section.destination()),
                                &pairs,
                            );
                            summary.batches += 1;
                            summary.integrals += count;
                            ParserState::ReadingBatch(section)
                        }
                    }
                    Some(LABEL_RECORD_LENGTH) => {
                        log::warn!("section {section} is not terminated, starting a new one");
                        ParserState::ReadingLabel
                    }
                    Some(size) => {
                        log::warn!("skipping {size} byte record inside section {section}");
                        summary.skipped_records += 1;
                        if !self.skip(size)? {
                            break;
                        }
                        ParserState::ReadingBatch(section)
                    }
                },
                ParserState::SectionDone(section) => {
                    log::debug!("section {section} done");
                    ParserState::AwaitingSectionHeader
                }
            };
        }

        summary.truncated = self.truncated;
        Ok(summary)
    }

    fn position(&mut self) -> anyhow::Result<u64> {
        Ok(self.reader.stream_position()?)
    }

    /// Checks that `needed` more bytes exist. On a truncated file the stream is moved to its end
    /// so the partial record is dropped.
    fn available(&mut self, needed: i64, what: &str) -> anyhow::Result<bool> {
        let position = self.position()?;
        let remaining = self.length.saturating_sub(position);

        if u64::try_from(needed).map_or(true, |needed| remaining < needed) {
            log::warn!(
                "integral file is truncated at byte {position}: {what} needs {needed} bytes, \
                 {remaining} left"
            );
            self.stop_at_end()?;
            return Ok(false);
        }
        Ok(true)
    }

    fn stop_at_end(&mut self) -> anyhow::Result<()> {
        self.reader.seek(SeekFrom::End(0))?;
        self.truncated = true;
        Ok(())
    }

    /// Reads a record marker, or `None` at the end of the stream.
    fn marker(&mut self) -> anyhow::Result<Option<i64>> {
        let position = self.position()?;
        if position >= self.length || !self.available(self.width.bytes(), "a record marker")? {
            return Ok(None);
        }

        let size = match self.width {
            MarkerWidth::Four => i64::from(self.reader.read_i32::<B>()?),
            MarkerWidth::Eight => self.reader.read_i64::<B>()?,
        };
        ensure!(
            size >= 0,
            "record at byte {position} declares negative length {size}"
        );
        Ok(Some(size))
    }

    /// Skips a payload and its trailing marker. Returns `false` if the file ends first.
    fn skip(&mut self, size: i64) -> anyhow::Result<bool> {
        let Some(span) = size.checked_add(self.width.bytes()) else {
            log::warn!(
                "integral file is truncated at byte {}: a skipped record declares length {size}",
                self.position()?
            );
            self.stop_at_end()?;
            return Ok(false);
        };
        if !self.available(span, "a skipped record")? {
            return Ok(false);
        }
        self.reader.seek(SeekFrom::Current(span))?;
        Ok(true)
    }

    fn label(&mut self) -> anyhow::Result<Option<[u8; 8]>> {
        if !self.available(LABEL_RECORD_LENGTH + self.width.bytes(), "a section label")? {
            return Ok(None);
        }

        let mut label = [0u8; 8];
        self.reader.read_exact(&mut label)?;
        self.reader.seek(SeekFrom::Current(self.width.bytes()))?;
        Ok(Some(label))
    }

    fn batch(&mut self, values: &mut [f64], indices: &mut [i64]) -> anyhow::Result<Option<i64>> {
        if !self.available(BATCH_RECORD_LENGTH + self.width.bytes(), "an integral batch")? {
            return Ok(None);
        }

        self.reader.read_f64_into::<B>(values)?;
        self.reader.read_i64_into::<B>(indices)?;
        let count = self.reader.read_i64::<B>()?;
        self.reader.seek(SeekFrom::Current(self.width.bytes()))?;
        Ok(Some(count))
    }
}

/// Turns packed 1-based indices into `(p + q N, v)` pairs of a dense `N x N` block, adding the
/// transposed element off the diagonal.
fn unpack_batch(
    n_orbitals: usize,
    values: &[f64],
    indices: &[i64],
    pairs: &mut Vec<(usize, f64)>,
) -> anyhow::Result<()> {
    pairs.clear();

    for (&value, &raw) in values.iter().zip(indices) {
        let Some((p, q)) = PackedIndex::from_one_based(raw).and_then(|pq| pq.unpack(n_orbitals))
        else {
            bail!("packed index {raw} does not address a pair of {n_orbitals} orbitals");
        };

        log::trace!("({p}, {q}) = {value}");
        pairs.push((p + q * n_orbitals, value));
        if p != q {
            pairs.push((q + p * n_orbitals, value));
        }
    }

    Ok(())
}

/// The one-electron products of an `IIII` file.
pub const ONE_ELECTRON_PRODUCTS: [BlockClass; 4] = [
    BlockClass::Overlap,
    BlockClass::Kinetic,
    BlockClass::NuclearAttraction,
    BlockClass::OneElectronHamiltonian,
];

/// Loads `S`, `T` and `H` from an `IIII` stream and derives `G = H - T`.
///
/// Sections missing from the file leave their block zero.
pub fn read_one_electron_integrals<R, B, S>(
    reader: R,
    n_orbitals: usize,
    store: &mut S,
) -> anyhow::Result<DecodeSummary>
where
    R: Read + Seek,
    B: ByteOrder,
    S: TensorStore,
{
    ensure!(n_orbitals > 0, "at least one orbital is needed");

    for class in ONE_ELECTRON_PRODUCTS {
        store.declare(BlockKey::spatial(class), smallvec![n_orbitals, n_orbitals]);
    }

    let mut file = IntegralFileReader::<R, B>::new(reader)?;
    let summary = file.decode(n_orbitals, store)?;

    for section in [
        SectionLabel::Overlap,
        SectionLabel::Kinetic,
        SectionLabel::OneElectronHamiltonian,
    ] {
        let key = BlockKey::spatial(section.destination());
        if store.get_local_data(&key).is_none() {
            if summary.sections.contains(&section) {
                log::warn!("section {section} holds no integrals, {key} stays zero");
            } else {
                log::warn!("integral file has no {section} section, {key} stays zero");
            }
            store.write_local_data(&key, &[]);
        }
    }

    nuclear_attraction_plan().apply(store);

    log::info!(
        "read {} integrals in {} batches from {} sections ({} skipped records, {} ignored sections)",
        summary.integrals,
        summary.batches,
        summary.sections.len(),
        summary.skipped_records,
        summary.ignored_sections
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use byteorder::BigEndian;

    use super::*;
    use crate::{
        tensor::MemoryStore,
        testing::{pack, IntegralFileWriter},
    };

    fn key(class: BlockClass) -> BlockKey {
        BlockKey::spatial(class)
    }

    fn decode(bytes: Vec<u8>, n: usize) -> (MemoryStore, DecodeSummary) {
        let mut store = MemoryStore::new();
        let summary = read_one_electron_integrals::<_, LittleEndian, _>(
            Cursor::new(bytes),
            n,
            &mut store,
        )
        .unwrap();
        (store, summary)
    }

    #[test]
    fn single_overlap_element() {
        let mut writer = IntegralFileWriter::<_, LittleEndian>::new(Vec::new(), MarkerWidth::Four);
        writer.section(SectionLabel::Overlap, &[(0, 0, 1.0)]).unwrap();

        let (store, summary) = decode(writer.into_inner(), 2);

        assert_eq!(summary.sections, vec![SectionLabel::Overlap]);
        assert_eq!(summary.integrals, 1);
        assert!(!summary.truncated);

        let overlap = store.matrix(&key(BlockClass::Overlap)).unwrap();
        assert_eq!(overlap[(0, 0)], 1.0);
        assert_eq!(overlap.iter().filter(|&&v| v != 0.0).count(), 1);
    }

    #[test]
    fn both_marker_widths() {
        for width in [MarkerWidth::Four, MarkerWidth::Eight] {
            let mut writer = IntegralFileWriter::<_, LittleEndian>::new(Vec::new(), width);
            writer
                .section(SectionLabel::Kinetic, &[(1, 0, 0.5), (1, 1, 2.0)])
                .unwrap();

            let bytes = writer.into_inner();
            let reader = IntegralFileReader::<_, LittleEndian>::new(Cursor::new(bytes.clone()));
            assert_eq!(reader.unwrap().width(), width);

            let (store, _) = decode(bytes, 2);
            let kinetic = store.matrix(&key(BlockClass::Kinetic)).unwrap();
            assert_eq!(kinetic[(1, 0)], 0.5);
            assert_eq!(kinetic[(0, 1)], 0.5);
            assert_eq!(kinetic[(1, 1)], 2.0);
            assert_eq!(kinetic[(0, 0)], 0.0);
        }
    }

    #[test]
    fn big_endian_file() {
        let mut writer = IntegralFileWriter::<_, BigEndian>::new(Vec::new(), MarkerWidth::Eight);
        writer.section(SectionLabel::Overlap, &[(2, 1, -0.25)]).unwrap();

        let mut store = MemoryStore::new();
        read_one_electron_integrals::<_, BigEndian, _>(
            Cursor::new(writer.into_inner()),
            3,
            &mut store,
        )
        .unwrap();

        let overlap = store.matrix(&key(BlockClass::Overlap)).unwrap();
        assert_eq!(overlap[(2, 1)], -0.25);
        assert_eq!(overlap[(1, 2)], -0.25);
    }

    #[test]
    fn rejects_unknown_header() {
        let bytes = vec![0u8; 64];
        assert!(IntegralFileReader::<_, LittleEndian>::new(Cursor::new(bytes)).is_err());
    }

    #[test]
    fn nuclear_attraction_is_hamiltonian_minus_kinetic() {
        let mut writer = IntegralFileWriter::<_, LittleEndian>::new(Vec::new(), MarkerWidth::Four);
        writer
            .section(SectionLabel::OneElectronHamiltonian, &[(0, 0, -3.0), (1, 0, 0.5)])
            .unwrap();
        writer
            .section(SectionLabel::Kinetic, &[(0, 0, 1.0), (1, 1, 0.75)])
            .unwrap();

        let (store, _) = decode(writer.into_inner(), 2);
        let g = store.matrix(&key(BlockClass::NuclearAttraction)).unwrap();

        approx::assert_abs_diff_eq!(g[(0, 0)], -4.0);
        approx::assert_abs_diff_eq!(g[(1, 0)], 0.5);
        approx::assert_abs_diff_eq!(g[(0, 1)], 0.5);
        approx::assert_abs_diff_eq!(g[(1, 1)], -0.75);
    }

    #[test]
    fn missing_sections_stay_zero() {
        let mut writer = IntegralFileWriter::<_, LittleEndian>::new(Vec::new(), MarkerWidth::Four);
        writer.section(SectionLabel::Overlap, &[(0, 0, 1.0)]).unwrap();

        let (store, _) = decode(writer.into_inner(), 1);

        for class in ONE_ELECTRON_PRODUCTS {
            assert!(store.get_local_data(&key(class)).is_some());
        }
        assert_eq!(store.get_local_data(&key(BlockClass::Kinetic)), Some(vec![0.0]));
        assert_eq!(
            store.get_local_data(&key(BlockClass::NuclearAttraction)),
            Some(vec![0.0])
        );
    }

    #[test]
    fn one_store_write_per_batch() {
        let n = 50;
        let triangle = (0..n)
            .flat_map(|p| (0..=p).map(move |q| (p, q, (p * n + q) as f64)))
            .collect::<Vec<_>>();
        assert_eq!(triangle.len(), 1275);

        let mut writer = IntegralFileWriter::<_, LittleEndian>::new(Vec::new(), MarkerWidth::Four);
        writer.section(SectionLabel::Overlap, &triangle).unwrap();

        let (store, summary) = decode(writer.into_inner(), n);

        assert_eq!(summary.batches, 3);
        assert_eq!(summary.integrals, 1275);
        assert_eq!(store.block(&key(BlockClass::Overlap)).unwrap().writes(), 3);

        let overlap = store.matrix(&key(BlockClass::Overlap)).unwrap();
        for (p, q, value) in triangle {
            assert_eq!(overlap[(p, q)], value);
            assert_eq!(overlap[(q, p)], value);
        }
    }

    #[test]
    fn resynchronises_over_junk_and_unknown_sections() {
        let mut writer = IntegralFileWriter::<_, LittleEndian>::new(Vec::new(), MarkerWidth::Eight);
        writer.record(&[7u8; 13]).unwrap();
        writer.section_raw(b"NUCREP  ", &[(0, 0, 9.0)]).unwrap();
        writer.record(&[]).unwrap();
        writer.section(SectionLabel::Kinetic, &[(1, 1, 4.0)]).unwrap();

        let (store, summary) = decode(writer.into_inner(), 2);

        assert_eq!(summary.sections, vec![SectionLabel::Kinetic]);
        assert_eq!(summary.ignored_sections, 1);
        // the junk record, the ignored section's batch and sentinel, the empty record
        assert_eq!(summary.skipped_records, 4);

        let kinetic = store.matrix(&key(BlockClass::Kinetic)).unwrap();
        assert_eq!(kinetic[(1, 1)], 4.0);
        assert_eq!(kinetic[(0, 0)], 0.0);
    }

    #[test]
    fn junk_inside_section_is_skipped() {
        let mut writer = IntegralFileWriter::<_, LittleEndian>::new(Vec::new(), MarkerWidth::Four);
        writer.label(SectionLabel::Overlap.as_bytes()).unwrap();
        writer.batch(&[(0, 0, 1.0)]).unwrap();
        writer.record(&[1u8; 24]).unwrap();
        writer.batch(&[(1, 1, 2.0)]).unwrap();
        writer.sentinel().unwrap();

        let (store, summary) = decode(writer.into_inner(), 2);

        assert_eq!(summary.batches, 2);
        assert_eq!(summary.skipped_records, 1);
        let overlap = store.matrix(&key(BlockClass::Overlap)).unwrap();
        assert_eq!(overlap[(0, 0)], 1.0);
        assert_eq!(overlap[(1, 1)], 2.0);
    }

    #[test]
    fn missing_sentinel_starts_next_section() {
        let mut writer = IntegralFileWriter::<_, LittleEndian>::new(Vec::new(), MarkerWidth::Four);
        writer.label(SectionLabel::Overlap.as_bytes()).unwrap();
        writer.batch(&[(0, 0, 1.0)]).unwrap();
        writer.section(SectionLabel::Kinetic, &[(0, 0, 3.0)]).unwrap();

        let (store, summary) = decode(writer.into_inner(), 1);

        assert_eq!(
            summary.sections,
            vec![SectionLabel::Overlap, SectionLabel::Kinetic]
        );
        assert_eq!(store.get_local_data(&key(BlockClass::Overlap)), Some(vec![1.0]));
        assert_eq!(store.get_local_data(&key(BlockClass::Kinetic)), Some(vec![3.0]));
    }

    #[test]
    fn oversized_count_is_discarded() {
        let mut writer = IntegralFileWriter::<_, LittleEndian>::new(Vec::new(), MarkerWidth::Four);
        writer.label(SectionLabel::Overlap.as_bytes()).unwrap();
        writer
            .batch_with_count(&[1.0; BATCH_CAPACITY], &[1; BATCH_CAPACITY], 601)
            .unwrap();
        writer.batch(&[(0, 0, 5.0)]).unwrap();
        writer.sentinel().unwrap();

        let (store, summary) = decode(writer.into_inner(), 1);

        assert_eq!(summary.discarded_batches, 1);
        assert_eq!(summary.batches, 1);
        assert_eq!(store.get_local_data(&key(BlockClass::Overlap)), Some(vec![5.0]));
    }

    #[test]
    fn truncated_file_keeps_complete_batches() {
        let mut writer = IntegralFileWriter::<_, LittleEndian>::new(Vec::new(), MarkerWidth::Four);
        writer.label(SectionLabel::Overlap.as_bytes()).unwrap();
        writer.batch(&[(0, 0, 1.0)]).unwrap();
        writer.batch(&[(1, 1, 2.0)]).unwrap();

        let mut bytes = writer.into_inner();
        bytes.truncate(bytes.len() - 100);

        let (store, summary) = decode(bytes, 2);

        assert_eq!(summary.batches, 1);
        assert!(summary.truncated);
        let overlap = store.matrix(&key(BlockClass::Overlap)).unwrap();
        assert_eq!(overlap[(0, 0)], 1.0);
        assert_eq!(overlap[(1, 1)], 0.0);
    }

    #[test]
    fn invalid_packed_index_is_fatal() {
        let mut writer = IntegralFileWriter::<_, LittleEndian>::new(Vec::new(), MarkerWidth::Four);
        writer.label(SectionLabel::Overlap.as_bytes()).unwrap();
        // (2, 0) does not exist with two orbitals
        writer.batch_with_count(&[1.0], &[pack(2, 0)], 1).unwrap();
        writer.sentinel().unwrap();

        let mut store = MemoryStore::new();
        let result = read_one_electron_integrals::<_, LittleEndian, _>(
            Cursor::new(writer.into_inner()),
            2,
            &mut store,
        );
        assert!(result.is_err());

        let mut writer = IntegralFileWriter::<_, LittleEndian>::new(Vec::new(), MarkerWidth::Four);
        writer.label(SectionLabel::Overlap.as_bytes()).unwrap();
        writer.batch_with_count(&[1.0], &[0], 1).unwrap();

        let mut store = MemoryStore::new();
        let result = read_one_electron_integrals::<_, LittleEndian, _>(
            Cursor::new(writer.into_inner()),
            2,
            &mut store,
        );
        assert!(result.is_err());
    }

    #[test]
    fn negative_record_length_is_fatal() {
        let mut writer = IntegralFileWriter::<_, LittleEndian>::new(Vec::new(), MarkerWidth::Four);
        writer.header().unwrap();
        let mut bytes = writer.into_inner();
        bytes.extend_from_slice(&(-16i32).to_le_bytes());
        bytes.extend_from_slice(&[0u8; 32]);

        let mut store = MemoryStore::new();
        let result = read_one_electron_integrals::<_, LittleEndian, _>(
            Cursor::new(bytes),
            1,
            &mut store,
        );
        assert!(result.is_err());
    }

    #[test]
    fn oversized_record_length_is_truncation() {
        let mut writer = IntegralFileWriter::<_, LittleEndian>::new(Vec::new(), MarkerWidth::Eight);
        writer.header().unwrap();
        let mut bytes = writer.into_inner();
        bytes.extend_from_slice(&i64::MAX.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 32]);

        let (store, summary) = decode(bytes, 1);

        assert!(summary.truncated);
        assert_eq!(summary.skipped_records, 1);
        assert!(summary.sections.is_empty());
        assert_eq!(store.get_local_data(&key(BlockClass::Overlap)), Some(vec![0.0]));
    }

    #[test]
    fn empty_section_is_read_as_zeros() {
        let mut writer = IntegralFileWriter::<_, LittleEndian>::new(Vec::new(), MarkerWidth::Four);
        writer.section(SectionLabel::Overlap, &[(0, 0, 1.0)]).unwrap();
        writer.section(SectionLabel::Kinetic, &[]).unwrap();

        let (store, summary) = decode(writer.into_inner(), 1);

        assert_eq!(
            summary.sections,
            vec![SectionLabel::Overlap, SectionLabel::Kinetic]
        );
        assert_eq!(summary.batches, 1);
        assert_eq!(store.get_local_data(&key(BlockClass::Kinetic)), Some(vec![0.0]));
        assert_eq!(
            store.get_local_data(&key(BlockClass::OneElectronHamiltonian)),
            Some(vec![0.0])
        );
    }
}
