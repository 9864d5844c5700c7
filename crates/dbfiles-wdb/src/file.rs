//! Client table file handle.

use std::any::{type_name, TypeId};
use std::fs::File;
use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;

use hashbrown::HashMap as FastHashMap;
use memmap2::Mmap;
use parking_lot::RwLock;
use rustc_hash::FxHasher;

use crate::header::{self, FileLayout};
use crate::mapping::{FieldMapping, MappingOptions};
use crate::plan::{CompileOptions, DecodeContext, DecodingPlan};
use crate::record_reader::RecordReader;
use crate::schema::TableRecord;
use crate::segments::{
    CommonTable, CopyTable, IndexTable, OffsetIndexSegments, OffsetMap, RelationshipMap, StringTable,
};
use crate::types::{CompressionKind, FormatVersion};
use crate::{Error, Result};

type FxHashMap<K, V> = FastHashMap<K, V, std::hash::BuildHasherDefault<FxHasher>>;

type PlanEntry = std::result::Result<Arc<DecodingPlan>, Arc<Error>>;

/// Options for opening a file.
#[derive(Debug, Clone, Copy)]
pub struct LoadOptions {
    /// Memory-map the file instead of reading it into memory.
    pub memory_map: bool,
    /// Yield copy-table rows after their source record when enumerating.
    pub include_copies: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            memory_map: true,
            include_copies: false,
        }
    }
}

enum Storage {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl std::ops::Deref for Storage {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Self::Mapped(mmap) => mmap,
            Self::Owned(data) => data,
        }
    }
}

/// An open client table.
///
/// Segment tables are built when the file is opened. Decoding plans are
/// compiled on first use per target type and cached for the handle's
/// lifetime, failures included.
pub struct ClientFile {
    storage: Storage,
    layout: FileLayout,
    options: LoadOptions,
    strings: Option<StringTable>,
    common: Option<CommonTable>,
    /// First common table column backing a `CommonTableSparse` descriptor.
    common_base: usize,
    segments: OffsetIndexSegments,
    plans: RwLock<FxHashMap<TypeId, PlanEntry>>,
}

impl ClientFile {
    /// Open a file with default options.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, LoadOptions::default())
    }

    pub fn open_with<P: AsRef<Path>>(path: P, options: LoadOptions) -> Result<Self> {
        let path = path.as_ref();
        let storage = if options.memory_map {
            let file = File::open(path)?;
            Storage::Mapped(unsafe { Mmap::map(&file)? })
        } else {
            Storage::Owned(std::fs::read(path)?)
        };
        tracing::debug!(path = %path.display(), bytes = storage.len(), "opening client table");
        Self::build(storage, None, options)
    }

    /// Parse a file already in memory.
    pub fn parse(data: Vec<u8>) -> Result<Self> {
        Self::parse_with(data, LoadOptions::default())
    }

    pub fn parse_with(data: Vec<u8>, options: LoadOptions) -> Result<Self> {
        Self::build(Storage::Owned(data), None, options)
    }

    /// Use a layout produced by an external header reader.
    pub fn with_layout(data: Vec<u8>, layout: FileLayout, options: LoadOptions) -> Result<Self> {
        Self::build(Storage::Owned(data), Some(layout), options)
    }

    fn build(storage: Storage, layout: Option<FileLayout>, options: LoadOptions) -> Result<Self> {
        let layout = match layout {
            Some(layout) => {
                layout.validate(storage.len())?;
                layout
            }
            None => header::read_layout(&storage)?,
        };
        let data: &[u8] = &storage;

        let strings = if layout.string_block.exists() {
            Some(StringTable::parse(layout.string_block.slice(data)?)?)
        } else if layout.has_string_block() {
            Some(StringTable::default())
        } else {
            None
        };

        let common = if layout.common_table.exists() {
            Some(CommonTable::parse(layout.common_table.slice(data)?, layout.key_size)?)
        } else {
            None
        };

        let declared = layout.common_descriptor_count();
        let available = common.as_ref().map_or(0, CommonTable::column_count);
        let common_base = available.checked_sub(declared).ok_or_else(|| {
            Error::structural(format!(
                "layout declares {declared} common columns but the common table holds {available}"
            ))
        })?;

        let mut segments = OffsetIndexSegments::default();
        if layout.offset_map.exists() {
            segments.offset_map = Some(OffsetMap::parse(layout.offset_map.slice(data)?, layout.min_id)?);
        }
        if layout.index_table.exists() {
            segments.index_table = Some(IndexTable::parse(
                layout.index_table.slice(data)?,
                layout.record_count,
                layout.key_size,
            )?);
        }
        if layout.copy_table.exists() {
            segments.copy_table = Some(CopyTable::parse(layout.copy_table.slice(data)?)?);
        }
        if layout.relationship_map.exists() {
            segments.relationships = Some(RelationshipMap::parse(layout.relationship_map.slice(data)?)?);
        }

        tracing::debug!(
            version = %layout.version,
            records = layout.record_count,
            strings = strings.as_ref().map_or(0, StringTable::len),
            common_columns = common.as_ref().map_or(0, CommonTable::column_count),
            sparse = segments.is_sparse(),
            "client table opened"
        );

        Ok(Self {
            storage,
            layout,
            options,
            strings,
            common,
            common_base,
            segments,
            plans: RwLock::new(FxHashMap::default()),
        })
    }

    #[inline]
    pub fn layout(&self) -> &FileLayout {
        &self.layout
    }

    #[inline]
    pub fn version(&self) -> FormatVersion {
        self.layout.version
    }

    #[inline]
    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    /// Raw file bytes.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.storage
    }

    #[inline]
    pub fn strings(&self) -> Option<&StringTable> {
        self.strings.as_ref()
    }

    #[inline]
    pub fn common(&self) -> Option<&CommonTable> {
        self.common.as_ref()
    }

    /// Index of the first common table column mapped to a descriptor.
    #[inline]
    pub fn common_column_base(&self) -> usize {
        self.common_base
    }

    #[inline]
    pub fn segments(&self) -> &OffsetIndexSegments {
        &self.segments
    }

    /// Number of stored records, copies excluded.
    pub fn record_count(&self) -> usize {
        match &self.segments.offset_map {
            Some(map) => map.len(),
            None => self.layout.record_count,
        }
    }

    /// Bytes of the `index`-th record.
    pub fn record_bytes(&self, index: usize) -> Result<&[u8]> {
        let data = self.data();
        if let Some(map) = &self.segments.offset_map {
            let entry = map.entry(index).ok_or(Error::Bounds {
                offset: index,
                needed: 1,
                available: map.len(),
            })?;
            let end = entry.offset.checked_add(entry.size);
            return end.and_then(|end| data.get(entry.offset..end)).ok_or(Error::Bounds {
                offset: entry.offset,
                needed: entry.size,
                available: data.len().saturating_sub(entry.offset),
            });
        }

        let stride = self.layout.record_size;
        if index >= self.layout.record_count {
            return Err(Error::Bounds {
                offset: index.saturating_mul(stride),
                needed: stride,
                available: self.layout.records.len,
            });
        }
        // Saturated positions fall outside `data` and surface as bounds errors.
        let start = self.layout.records.start.saturating_add(index.saturating_mul(stride));
        start.checked_add(stride).and_then(|end| data.get(start..end)).ok_or(Error::Bounds {
            offset: start,
            needed: stride,
            available: data.len().saturating_sub(start),
        })
    }

    /// Key of the `index`-th record.
    ///
    /// Comes from the index table or offset map when present, otherwise from
    /// the inline key column.
    pub fn record_key(&self, index: usize) -> Result<Option<u32>> {
        if let Some(key) = self.segments.record_key(index) {
            return Ok(Some(key));
        }
        let reader = RecordReader::new(self.record_bytes(index)?, None);
        let descriptors = &self.layout.descriptors;
        match self.layout.id_index.and_then(|i| descriptors.get(i)) {
            Some(d) if d.compression.is_inline() => {
                reader.read_bits(d.bit_offset, d.element_bits().min(32)).map(|k| Some(k as u32))
            }
            None if descriptors.is_empty() => reader.read_bits(0, 32).map(|k| Some(k as u32)),
            _ => Ok(None),
        }
    }

    /// Decoding plan for `T`, compiled on first request.
    pub fn plan<T: TableRecord>(&self) -> Result<Arc<DecodingPlan>> {
        let id = TypeId::of::<T>();
        let cached = self.plans.read().get(&id).cloned();
        let entry = match cached {
            Some(entry) => entry,
            None => {
                let compiled = self.compile::<T>().map(Arc::new).map_err(Arc::new);
                if let Err(err) = &compiled {
                    tracing::warn!(target_type = type_name::<T>(), error = %err, "decoding plan failed");
                }
                self.plans.write().entry(id).or_insert(compiled).clone()
            }
        };
        entry.map_err(|source| Error::PlanUnavailable {
            type_name: type_name::<T>(),
            source,
        })
    }

    fn compile<T: TableRecord>(&self) -> Result<DecodingPlan> {
        let mapping = FieldMapping::build(
            &T::members(),
            &self.layout.descriptors,
            MappingOptions {
                key_out_of_line: self.layout.key_out_of_line(),
            },
        )?;
        let options = CompileOptions {
            style: self.layout.plan_style(),
            common_column_base: self.common_base,
        };
        tracing::debug!(target_type = type_name::<T>(), style = ?options.style, "compiling decoding plan");
        DecodingPlan::compile(&mapping, options)
    }

    /// Decode the `index`-th record.
    pub fn decode<T: TableRecord + Default>(&self, index: usize) -> Result<T> {
        let plan = self.plan::<T>()?;
        self.decode_with(&plan, index, None)
    }

    fn decode_with<T: TableRecord + Default>(
        &self,
        plan: &DecodingPlan,
        index: usize,
        copy_key: Option<u32>,
    ) -> Result<T> {
        let bytes = self.record_bytes(index)?;
        let mut reader = RecordReader::new(bytes, self.strings.as_ref());
        let ctx = DecodeContext {
            strings: self.strings.as_ref(),
            common: self.common.as_ref(),
            relationships: self.segments.relationships.as_ref(),
            key: self.segments.record_key(index),
            record_index: index as u32,
        };

        let mut value = T::default();
        plan.execute_into(&mut reader, &ctx, &mut value)?;
        if let Some(key) = copy_key {
            plan.set_key(&mut value, key)?;
        }
        Ok(value)
    }

    /// Enumerate records in storage order.
    ///
    /// With [`LoadOptions::include_copies`], each record is followed by its
    /// copy-table duplicates, which carry the copy's key.
    pub fn records<T: TableRecord + Default>(&self) -> Records<'_, T> {
        let (plan, error) = match self.plan::<T>() {
            Ok(plan) => (Some(plan), None),
            Err(err) => (None, Some(err)),
        };
        Records {
            file: self,
            plan,
            error,
            next: 0,
            copies: &[],
            copy_pos: 0,
            copy_source: 0,
            _marker: PhantomData,
        }
    }

    /// Decode every record in parallel, preserving storage order.
    #[cfg(feature = "parallel")]
    pub fn par_decode<T: TableRecord + Default + Send>(&self) -> Result<Vec<T>> {
        use rayon::prelude::*;

        let plan = self.plan::<T>()?;
        (0..self.record_count())
            .into_par_iter()
            .map(|index| self.decode_with(&plan, index, None))
            .collect()
    }

    /// Uninterpreted column values of the `index`-th record.
    ///
    /// Each column yields its elements; a common-table column yields one
    /// value, or none when the record has no entry.
    pub fn raw_row(&self, index: usize) -> Result<Vec<Vec<u64>>> {
        let reader = RecordReader::new(self.record_bytes(index)?, None);

        if self.layout.descriptors.is_empty() {
            return (0..self.layout.field_count)
                .map(|i| reader.read_bits(i * 32, 32).map(|v| vec![v]))
                .collect();
        }
        if self.segments.is_sparse() {
            return Err(Error::unsupported("sparse records have no fixed column positions"));
        }

        let key = self.record_key(index)?;
        let mut common_index = 0;

        let mut row = Vec::with_capacity(self.layout.descriptors.len());
        for descriptor in &self.layout.descriptors {
            let values = match descriptor.compression {
                CompressionKind::None | CompressionKind::Bitpacked => {
                    let bits = descriptor.element_bits();
                    (0..descriptor.cardinality)
                        .map(|i| reader.read_bits(descriptor.bit_offset + i * bits as usize, bits))
                        .collect::<Result<Vec<_>>>()?
                }
                CompressionKind::CommonTableSparse => {
                    let column = self.common_base + common_index;
                    common_index += 1;
                    key.and_then(|k| self.common.as_ref()?.raw_value(column, k))
                        .map(u64::from)
                        .into_iter()
                        .collect()
                }
                CompressionKind::PalletArray | CompressionKind::RelationshipData => Vec::new(),
            };
            row.push(values);
        }
        Ok(row)
    }
}

/// Iterator over decoded records.
pub struct Records<'f, T> {
    file: &'f ClientFile,
    plan: Option<Arc<DecodingPlan>>,
    error: Option<Error>,
    next: usize,
    copies: &'f [u32],
    copy_pos: usize,
    copy_source: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T: TableRecord + Default> Iterator for Records<'_, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(err) = self.error.take() {
            return Some(Err(err));
        }
        let plan = self.plan.as_ref()?;

        if let Some(&key) = self.copies.get(self.copy_pos) {
            self.copy_pos += 1;
            return Some(self.file.decode_with(plan, self.copy_source, Some(key)));
        }

        if self.next >= self.file.record_count() {
            return None;
        }
        let index = self.next;
        self.next += 1;

        if self.file.options.include_copies {
            match self.file.record_key(index) {
                Ok(Some(key)) => {
                    self.copies = self.file.segments.copies_of(key);
                    self.copy_pos = 0;
                    self.copy_source = index;
                }
                Ok(None) => self.copies = &[],
                Err(err) => return Some(Err(err)),
            }
        }

        Some(self.file.decode_with(plan, index, None))
    }
}
