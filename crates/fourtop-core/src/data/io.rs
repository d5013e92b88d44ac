//! Parquet reading and writing of event and matched-event datasets.

use super::*;
use crate::{FourTopError, FourTopResult};
use arrow::{
    array::{
        Array, ArrayRef, AsArray, BooleanArray, Float32Array, Float32Builder, Float64Array,
        Float64Builder, Int32Array, Int32Builder, Int64Array, ListBuilder,
    },
    datatypes::{DataType, Field, Float32Type, Float64Type, Int32Type, Int64Type, Schema},
    record_batch::RecordBatch,
};
use log::debug;
use parquet::arrow::{arrow_reader::ParquetRecordBatchReaderBuilder, ArrowWriter};
use std::{
    fs::File,
    path::{Path, PathBuf},
};

/// The particle collection, with `(component, Delphes spelling)` pairs.
const PARTICLE_COLLECTION: &str = "particle";
const PARTICLE_INT_COMPONENTS: [(&str, &str); 4] =
    [("pid", "PID"), ("status", "Status"), ("d1", "D1"), ("d2", "D2")];
const PARTICLE_FLOAT_COMPONENTS: [(&str, &str); 4] =
    [("px", "Px"), ("py", "Py"), ("pz", "Pz"), ("e", "E")];

/// The jet collection, with `(component, Delphes spelling)` pairs.
const JET_COLLECTION: &str = "jet";
const JET_FLOAT_COMPONENTS: [(&str, &str); 4] =
    [("pt", "PT"), ("eta", "Eta"), ("phi", "Phi"), ("mass", "Mass")];
const JET_BTAG_COMPONENT: (&str, &str) = ("btag", "BTag");

/// Name of the per-jet parton index column in matched output.
pub const JET_PARTON_MATCH_COLUMN: &str = "jet_parton_match";

fn canonicalize_dataset_path(file_path: &str) -> FourTopResult<PathBuf> {
    Ok(Path::new(&*shellexpand::full(file_path)?).canonicalize()?)
}

fn expand_output_path(file_path: &str) -> FourTopResult<PathBuf> {
    Ok(PathBuf::from(&*shellexpand::full(file_path)?))
}

/// Load a [`Dataset`] from a Parquet file with one row per event.
///
/// Particles are read from the list columns `particle_pid`, `particle_status`, `particle_d1`,
/// `particle_d2`, `particle_px`, `particle_py`, `particle_pz` and `particle_e`, jets from
/// `jet_pt`, `jet_eta`, `jet_phi`, `jet_mass` and `jet_btag`. Delphes-style names such as
/// `Particle.PID` or `Jet_PT` are accepted as well.
pub fn read_parquet(file_path: &str) -> FourTopResult<Dataset> {
    let mut events = Vec::new();
    for batch in open_batches(file_path)? {
        let batch = batch?;
        let particles = ParticleColumns::prepare(&batch)?;
        let jets = JetColumns::prepare(&batch)?;
        for row in 0..batch.num_rows() {
            let event_index = events.len();
            events.push(Event::new(
                particles.read(row, event_index)?,
                jets.read(row, event_index)?,
            ));
        }
    }
    debug!("Read {} events from {}", events.len(), file_path);
    Ok(Dataset::new(events))
}

/// Load a [`MatchedDataset`] written by [`write_matched_parquet`].
///
/// The file does not store the input position of each event, so events are numbered in file
/// order.
pub fn read_matched_parquet(file_path: &str) -> FourTopResult<MatchedDataset> {
    let mut events = Vec::new();
    for batch in open_batches(file_path)? {
        let batch = batch?;
        let jets = JetColumns::prepare(&batch)?;
        let matches = ListColumn::prepare(
            &batch,
            &[JET_PARTON_MATCH_COLUMN.to_string()],
            JET_PARTON_MATCH_COLUMN,
        )?;
        let matches_values = IntValues::prepare(matches.name.clone(), matches.values)?;
        for row in 0..batch.num_rows() {
            let index = events.len();
            let jets = jets.read(row, index)?;
            let range = matches.range(row);
            if range.len() != jets.len() {
                return Err(FourTopError::LengthMismatch {
                    context: format!("{JET_PARTON_MATCH_COLUMN} in event {index}"),
                    expected: jets.len(),
                    actual: range.len(),
                });
            }
            events.push(MatchedEvent {
                index,
                jets,
                jet_parton_match: range
                    .map(|i| matches_values.int32(&matches.name, i))
                    .collect::<FourTopResult<_>>()?,
            });
        }
    }
    Ok(MatchedDataset::new(events))
}

fn open_batches(
    file_path: &str,
) -> FourTopResult<parquet::arrow::arrow_reader::ParquetRecordBatchReader> {
    let path = canonicalize_dataset_path(file_path)?;
    let file = File::open(path)?;
    Ok(ParquetRecordBatchReaderBuilder::try_new(file)?.build()?)
}

/// Persist a [`Dataset`] to a Parquet file in the layout read by [`read_parquet`].
pub fn write_parquet(
    dataset: &Dataset,
    file_path: &str,
    options: &DatasetWriteOptions,
) -> FourTopResult<()> {
    let path = expand_output_path(file_path)?;
    let precision = options.precision;
    let mut fields = Vec::new();
    for (component, _) in PARTICLE_INT_COMPONENTS {
        fields.push(list_field(
            format!("{PARTICLE_COLLECTION}_{component}"),
            DataType::Int32,
        ));
    }
    for (component, _) in PARTICLE_FLOAT_COMPONENTS {
        fields.push(list_field(
            format!("{PARTICLE_COLLECTION}_{component}"),
            float_type(precision),
        ));
    }
    fields.extend(jet_fields(precision));
    let schema = Arc::new(Schema::new(fields));
    write_batches(dataset.events(), path, schema, options, |events| {
        let particle = |f: fn(&Particle) -> i32| {
            int_list_array(
                events
                    .iter()
                    .map(|event| event.particles.iter().map(f).collect::<Vec<_>>()),
            )
        };
        let momentum = |f: fn(&Vec4) -> f64| {
            float_list_array(
                events.iter().map(|event| {
                    event
                        .particles
                        .iter()
                        .map(|particle| f(&particle.p4))
                        .collect::<Vec<_>>()
                }),
                precision,
            )
        };
        let mut columns = vec![
            particle(|p| p.pid),
            particle(|p| p.status),
            particle(|p| p.d1),
            particle(|p| p.d2),
            momentum(Vec4::px),
            momentum(Vec4::py),
            momentum(Vec4::pz),
            momentum(Vec4::e),
        ];
        columns.extend(jet_arrays(
            events.iter().map(|event| event.jets.as_slice()),
            precision,
        ));
        columns
    })
}

/// Persist a [`MatchedDataset`] to a Parquet file.
///
/// Each row holds the selected jets of one kept event (`jet_pt`, `jet_eta`, `jet_phi`,
/// `jet_mass`, `jet_btag`) and the per-jet parton index `jet_parton_match`.
pub fn write_matched_parquet(
    dataset: &MatchedDataset,
    file_path: &str,
    options: &DatasetWriteOptions,
) -> FourTopResult<()> {
    let path = expand_output_path(file_path)?;
    let precision = options.precision;
    let mut fields = jet_fields(precision);
    fields.push(list_field(
        JET_PARTON_MATCH_COLUMN.to_string(),
        DataType::Int32,
    ));
    let schema = Arc::new(Schema::new(fields));
    write_batches(dataset.events(), path, schema, options, |events| {
        let mut columns = jet_arrays(events.iter().map(|event| event.jets.as_slice()), precision);
        columns.push(int_list_array(
            events.iter().map(|event| event.jet_parton_match.clone()),
        ));
        columns
    })
}

fn write_batches<T, F>(
    items: &[T],
    file_path: PathBuf,
    schema: Arc<Schema>,
    options: &DatasetWriteOptions,
    build_columns: F,
) -> FourTopResult<()>
where
    F: Fn(&[T]) -> Vec<ArrayRef>,
{
    let batch_size = options.batch_size.max(1);
    let file = File::create(&file_path)?;
    let mut writer = ArrowWriter::try_new(file, schema.clone(), None).map_err(|err| {
        FourTopError::Custom(format!("Failed to create Parquet writer: {err}"))
    })?;
    for chunk in items.chunks(batch_size) {
        let batch = RecordBatch::try_new(schema.clone(), build_columns(chunk))?;
        writer.write(&batch).map_err(|err| {
            FourTopError::Custom(format!("Failed to write Parquet batch: {err}"))
        })?;
    }
    writer
        .close()
        .map_err(|err| FourTopError::Custom(format!("Failed to finalise Parquet file: {err}")))?;
    debug!("Wrote {} rows to {}", items.len(), file_path.display());
    Ok(())
}

fn float_type(precision: FloatPrecision) -> DataType {
    match precision {
        FloatPrecision::F64 => DataType::Float64,
        FloatPrecision::F32 => DataType::Float32,
    }
}

/// A non-nullable list column whose items have the layout produced by [`ListBuilder`].
fn list_field(name: String, item_type: DataType) -> Field {
    Field::new(
        name,
        DataType::List(Arc::new(Field::new("item", item_type, true))),
        false,
    )
}

fn jet_fields(precision: FloatPrecision) -> Vec<Field> {
    let mut fields: Vec<Field> = JET_FLOAT_COMPONENTS
        .iter()
        .map(|(component, _)| {
            list_field(
                format!("{JET_COLLECTION}_{component}"),
                float_type(precision),
            )
        })
        .collect();
    fields.push(list_field(
        format!("{JET_COLLECTION}_{}", JET_BTAG_COMPONENT.0),
        DataType::Int32,
    ));
    fields
}

fn jet_arrays<'a, I>(rows: I, precision: FloatPrecision) -> Vec<ArrayRef>
where
    I: Iterator<Item = &'a [Jet]> + Clone,
{
    let component = |f: fn(&Jet) -> f64| {
        float_list_array(
            rows.clone()
                .map(|jets| jets.iter().map(f).collect::<Vec<_>>()),
            precision,
        )
    };
    vec![
        component(|jet| jet.pt),
        component(|jet| jet.eta),
        component(|jet| jet.phi),
        component(|jet| jet.mass),
        int_list_array(
            rows.clone()
                .map(|jets| jets.iter().map(|jet| jet.btag).collect::<Vec<_>>()),
        ),
    ]
}

fn float_list_array<I>(rows: I, precision: FloatPrecision) -> ArrayRef
where
    I: Iterator<Item = Vec<f64>>,
{
    match precision {
        FloatPrecision::F64 => {
            let mut builder = ListBuilder::new(Float64Builder::new());
            for row in rows {
                builder.values().append_slice(&row);
                builder.append(true);
            }
            Arc::new(builder.finish())
        }
        FloatPrecision::F32 => {
            let mut builder = ListBuilder::new(Float32Builder::new());
            for row in rows {
                for value in row {
                    builder.values().append_value(value as f32);
                }
                builder.append(true);
            }
            Arc::new(builder.finish())
        }
    }
}

fn int_list_array<I>(rows: I) -> ArrayRef
where
    I: Iterator<Item = Vec<i32>>,
{
    let mut builder = ListBuilder::new(Int32Builder::new());
    for row in rows {
        builder.values().append_slice(&row);
        builder.append(true);
    }
    Arc::new(builder.finish())
}

/// Possible column names for one component of a collection, most canonical first.
///
/// For the collection `jet` and the component `("pt", "PT")` these are `jet_pt`, `jet_Pt`,
/// `jet_PT`, `Jet.PT` and `Jet_PT`.
fn component_candidates(collection: &str, (component, delphes): (&str, &str)) -> Vec<String> {
    let mut candidates = vec![format!("{collection}_{component}")];
    let mut push = |candidate: String| {
        if !candidates.contains(&candidate) {
            candidates.push(candidate);
        }
    };

    let mut capitalized = component.to_string();
    if let Some(first) = capitalized.get_mut(0..1) {
        first.make_ascii_uppercase();
    }
    push(format!("{collection}_{capitalized}"));
    push(format!("{collection}_{}", component.to_ascii_uppercase()));

    let mut delphes_collection = collection.to_string();
    if let Some(first) = delphes_collection.get_mut(0..1) {
        first.make_ascii_uppercase();
    }
    push(format!("{delphes_collection}.{delphes}"));
    push(format!("{delphes_collection}_{delphes}"));
    candidates
}

/// One list column of a record batch, split into row offsets and flat values.
struct ListColumn<'a> {
    name: String,
    offsets: Vec<usize>,
    values: &'a ArrayRef,
}

impl<'a> ListColumn<'a> {
    fn prepare(
        batch: &'a RecordBatch,
        candidates: &[String],
        logical_name: &str,
    ) -> FourTopResult<Self> {
        for candidate in candidates {
            if let Some(column) = batch.column_by_name(candidate) {
                if let Some(list) = column.as_list_opt::<i32>() {
                    return Ok(Self {
                        name: candidate.clone(),
                        offsets: list.value_offsets().iter().map(|&o| o as usize).collect(),
                        values: list.values(),
                    });
                }
                if let Some(list) = column.as_list_opt::<i64>() {
                    return Ok(Self {
                        name: candidate.clone(),
                        offsets: list.value_offsets().iter().map(|&o| o as usize).collect(),
                        values: list.values(),
                    });
                }
                return Err(FourTopError::ColumnType {
                    name: candidate.clone(),
                    data_type: column.data_type().to_string(),
                });
            }
        }
        Err(FourTopError::MissingColumn {
            name: logical_name.to_string(),
        })
    }

    fn component(
        batch: &'a RecordBatch,
        collection: &str,
        component: (&str, &str),
    ) -> FourTopResult<Self> {
        Self::prepare(
            batch,
            &component_candidates(collection, component),
            &format!("{collection}_{}", component.0),
        )
    }

    fn range(&self, row: usize) -> std::ops::Range<usize> {
        self.offsets[row]..self.offsets[row + 1]
    }
}

enum FloatValues<'a> {
    F32(&'a Float32Array),
    F64(&'a Float64Array),
}

impl<'a> FloatValues<'a> {
    fn prepare(name: String, values: &'a ArrayRef) -> FourTopResult<Self> {
        if let Some(array) = values.as_primitive_opt::<Float64Type>() {
            return Ok(Self::F64(array));
        }
        if let Some(array) = values.as_primitive_opt::<Float32Type>() {
            return Ok(Self::F32(array));
        }
        Err(FourTopError::ColumnType {
            name,
            data_type: values.data_type().to_string(),
        })
    }

    fn value(&self, name: &str, index: usize) -> FourTopResult<f64> {
        let array: &dyn Array = match self {
            Self::F32(array) => *array,
            Self::F64(array) => *array,
        };
        check_not_null(array, name, index)?;
        Ok(match self {
            Self::F32(array) => array.value(index) as f64,
            Self::F64(array) => array.value(index),
        })
    }
}

enum IntValues<'a> {
    I32(&'a Int32Array),
    I64(&'a Int64Array),
    Bool(&'a BooleanArray),
}

impl<'a> IntValues<'a> {
    fn prepare(name: String, values: &'a ArrayRef) -> FourTopResult<Self> {
        if let Some(array) = values.as_primitive_opt::<Int32Type>() {
            return Ok(Self::I32(array));
        }
        if let Some(array) = values.as_primitive_opt::<Int64Type>() {
            return Ok(Self::I64(array));
        }
        if let Some(array) = values.as_boolean_opt() {
            return Ok(Self::Bool(array));
        }
        Err(FourTopError::ColumnType {
            name,
            data_type: values.data_type().to_string(),
        })
    }

    fn value(&self, name: &str, index: usize) -> FourTopResult<i64> {
        let array: &dyn Array = match self {
            Self::I32(array) => *array,
            Self::I64(array) => *array,
            Self::Bool(array) => *array,
        };
        check_not_null(array, name, index)?;
        Ok(match self {
            Self::I32(array) => array.value(index) as i64,
            Self::I64(array) => array.value(index),
            Self::Bool(array) => array.value(index) as i64,
        })
    }

    /// The value at `index`, which must fit into an `i32`.
    fn int32(&self, name: &str, index: usize) -> FourTopResult<i32> {
        let value = self.value(name, index)?;
        i32::try_from(value).map_err(|_| FourTopError::ValueOutOfRange {
            name: name.to_string(),
            value: value.to_string(),
        })
    }
}

fn check_not_null(array: &dyn Array, name: &str, index: usize) -> FourTopResult<()> {
    if array.is_null(index) {
        return Err(FourTopError::NullValue {
            name: name.to_string(),
        });
    }
    Ok(())
}

struct FloatListColumn<'a> {
    list: ListColumn<'a>,
    values: FloatValues<'a>,
}

impl<'a> FloatListColumn<'a> {
    fn component(
        batch: &'a RecordBatch,
        collection: &str,
        component: (&str, &str),
    ) -> FourTopResult<Self> {
        let list = ListColumn::component(batch, collection, component)?;
        let values = FloatValues::prepare(list.name.clone(), list.values)?;
        Ok(Self { list, values })
    }
}

struct IntListColumn<'a> {
    list: ListColumn<'a>,
    values: IntValues<'a>,
}

impl<'a> IntListColumn<'a> {
    fn component(
        batch: &'a RecordBatch,
        collection: &str,
        component: (&str, &str),
    ) -> FourTopResult<Self> {
        let list = ListColumn::component(batch, collection, component)?;
        let values = IntValues::prepare(list.name.clone(), list.values)?;
        Ok(Self { list, values })
    }
}

/// The value ranges of one row across several list columns, which must all have the same length.
fn row_ranges(
    lists: &[&ListColumn<'_>],
    row: usize,
    collection: &str,
    event_index: usize,
) -> FourTopResult<Vec<std::ops::Range<usize>>> {
    let ranges: Vec<_> = lists.iter().map(|list| list.range(row)).collect();
    let expected = ranges.first().map_or(0, |range| range.len());
    for (list, range) in lists.iter().zip(ranges.iter()) {
        if range.len() != expected {
            return Err(FourTopError::LengthMismatch {
                context: format!("{} ({collection} collection, event {event_index})", list.name),
                expected,
                actual: range.len(),
            });
        }
    }
    Ok(ranges)
}

struct ParticleColumns<'a> {
    ints: [IntListColumn<'a>; 4],
    floats: [FloatListColumn<'a>; 4],
}

impl<'a> ParticleColumns<'a> {
    fn prepare(batch: &'a RecordBatch) -> FourTopResult<Self> {
        let int = |component| IntListColumn::component(batch, PARTICLE_COLLECTION, component);
        let float = |component| FloatListColumn::component(batch, PARTICLE_COLLECTION, component);
        let [pid, status, d1, d2] = PARTICLE_INT_COMPONENTS;
        let [px, py, pz, e] = PARTICLE_FLOAT_COMPONENTS;
        Ok(Self {
            ints: [int(pid)?, int(status)?, int(d1)?, int(d2)?],
            floats: [float(px)?, float(py)?, float(pz)?, float(e)?],
        })
    }

    fn read(&self, row: usize, event_index: usize) -> FourTopResult<Vec<Particle>> {
        let lists: Vec<&ListColumn> = self
            .ints
            .iter()
            .map(|column| &column.list)
            .chain(self.floats.iter().map(|column| &column.list))
            .collect();
        let ranges = row_ranges(&lists, row, PARTICLE_COLLECTION, event_index)?;
        let n_particles = ranges[0].len();
        let int = |column: usize, i: usize| {
            let column_ref = &self.ints[column];
            column_ref
                .values
                .int32(&column_ref.list.name, ranges[column].start + i)
        };
        let float = |column: usize, i: usize| {
            let column_ref = &self.floats[column];
            column_ref.values.value(
                &column_ref.list.name,
                ranges[column + self.ints.len()].start + i,
            )
        };
        (0..n_particles)
            .map(|i| -> FourTopResult<Particle> {
                Ok(Particle {
                    pid: int(0, i)?,
                    status: int(1, i)?,
                    d1: int(2, i)?,
                    d2: int(3, i)?,
                    p4: Vec4::new(float(0, i)?, float(1, i)?, float(2, i)?, float(3, i)?),
                })
            })
            .collect()
    }
}

struct JetColumns<'a> {
    floats: [FloatListColumn<'a>; 4],
    btag: IntListColumn<'a>,
}

impl<'a> JetColumns<'a> {
    fn prepare(batch: &'a RecordBatch) -> FourTopResult<Self> {
        let float = |component| FloatListColumn::component(batch, JET_COLLECTION, component);
        let [pt, eta, phi, mass] = JET_FLOAT_COMPONENTS;
        Ok(Self {
            floats: [float(pt)?, float(eta)?, float(phi)?, float(mass)?],
            btag: IntListColumn::component(batch, JET_COLLECTION, JET_BTAG_COMPONENT)?,
        })
    }

    fn read(&self, row: usize, event_index: usize) -> FourTopResult<Vec<Jet>> {
        let lists: Vec<&ListColumn> = self
            .floats
            .iter()
            .map(|column| &column.list)
            .chain(std::iter::once(&self.btag.list))
            .collect();
        let ranges = row_ranges(&lists, row, JET_COLLECTION, event_index)?;
        let n_jets = ranges[0].len();
        let float = |column: usize, i: usize| {
            let column_ref = &self.floats[column];
            column_ref
                .values
                .value(&column_ref.list.name, ranges[column].start + i)
        };
        let btag_start = ranges[self.floats.len()].start;
        (0..n_jets)
            .map(|i| -> FourTopResult<Jet> {
                Ok(Jet {
                    pt: float(0, i)?,
                    eta: float(1, i)?,
                    phi: float(2, i)?,
                    mass: float(3, i)?,
                    btag: self.btag.values.int32(&self.btag.list.name, btag_start + i)?,
                })
            })
            .collect()
    }
}
