//! netCDF classic (CDF-1) and 64-bit offset (CDF-2) datasets held in memory.
//!
//! wgrib2 writes these by default. The file layout is handled by the
//! `netcdf3` crate; this module adds what the derived-field passes need on
//! top: values as `f64` whatever the stored type, fill values, variable
//! renames and an atomic save.

mod values;

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use netcdf3::{DataVector, FileReader, FileWriter};
use nwpfetch_fs::StagedFile;

use crate::{Error, Result};

pub use netcdf3::DataType;

/// Attribute holding a variable's missing-value marker.
pub const FILL_VALUE: &str = "_FillValue";

const HDF5_MAGIC: &[u8; 4] = b"\x89HDF";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    /// CDF-1, 32-bit offsets.
    Classic,
    /// CDF-2, 64-bit offsets.
    Offset64,
}

impl Version {
    /// Identify the format from the first four bytes of a file.
    pub fn sniff(magic: [u8; 4]) -> Result<Self> {
        match magic {
            [b'C', b'D', b'F', 1] => Ok(Version::Classic),
            [b'C', b'D', b'F', 2] => Ok(Version::Offset64),
            [b'C', b'D', b'F', other] => Err(Error::UnsupportedVersion(other)),
            m if &m == HDF5_MAGIC => Err(Error::Hdf5Unsupported),
            m => Err(Error::BadMagic(m)),
        }
    }

    fn to_netcdf3(self) -> netcdf3::Version {
        match self {
            Version::Classic => netcdf3::Version::Classic,
            Version::Offset64 => netcdf3::Version::Offset64Bit,
        }
    }
}

fn netcdf_error<E: std::fmt::Debug>(e: E) -> Error {
    Error::Netcdf(format!("{e:?}"))
}

/// A whole dataset: the header as a `netcdf3::DataSet` plus every
/// variable's data.
pub struct Dataset {
    version: Version,
    schema:  netcdf3::DataSet,
    data:    HashMap<String, DataVector>,
}

impl std::fmt::Debug for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dataset")
            .field("version", &self.version)
            .field("variables", &self.schema.get_var_names())
            .finish()
    }
}

impl Dataset {
    pub fn new(version: Version) -> Self {
        Self {
            version,
            schema: netcdf3::DataSet::new(),
            data: HashMap::new(),
        }
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// Read the header and all variables of `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut magic = [0u8; 4];
        File::open(path)
            .and_then(|mut file| file.read_exact(&mut magic))
            .map_err(|source| Error::Open {
                path: path.to_path_buf(),
                source,
            })?;
        let version = Version::sniff(magic)?;

        let mut reader = FileReader::open(path).map_err(netcdf_error)?;
        let data = reader.read_all_vars().map_err(netcdf_error)?;
        let (schema, _) = reader.close();
        Ok(Self {
            version,
            schema,
            data,
        })
    }

    /// Write the dataset to `<path>.tmp` and rename it over `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let staged = StagedFile::new(path)?;
        staged.clear()?;

        let mut writer = FileWriter::open(staged.path()).map_err(netcdf_error)?;
        writer
            .set_def(&self.schema, self.version.to_netcdf3(), 0)
            .map_err(netcdf_error)?;
        for name in self.schema.get_var_names() {
            let Some(data) = self.data.get(&name) else {
                continue;
            };
            match data {
                DataVector::I8(v) => writer.write_var_i8(&name, v),
                DataVector::U8(v) => writer.write_var_u8(&name, v),
                DataVector::I16(v) => writer.write_var_i16(&name, v),
                DataVector::I32(v) => writer.write_var_i32(&name, v),
                DataVector::F32(v) => writer.write_var_f32(&name, v),
                DataVector::F64(v) => writer.write_var_f64(&name, v),
            }
            .map_err(netcdf_error)?;
        }
        writer.close().map_err(netcdf_error)?;

        staged.commit()?;
        Ok(())
    }

    pub fn add_dimension(&mut self, name: &str, len: usize) -> Result<()> {
        self.schema.add_fixed_dim(name, len).map_err(netcdf_error)
    }

    /// Declare the unlimited dimension holding `records` records.
    pub fn add_record_dimension(&mut self, name: &str, records: usize) -> Result<()> {
        self.schema.set_unlimited_dim(name, records).map_err(netcdf_error)
    }

    pub fn has_dimensions(&self, names: &[&str]) -> bool {
        let present = self.schema.dim_names();
        names.iter().all(|name| present.iter().any(|d| d == name))
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.schema.has_var(name)
    }

    pub fn variable_names(&self) -> Vec<String> {
        self.schema.get_var_names()
    }

    pub fn data_type(&self, name: &str) -> Option<DataType> {
        self.schema.get_var(name).map(|var| var.data_type())
    }

    pub fn dimension_names(&self, name: &str) -> Option<Vec<String>> {
        self.schema.get_var(name).map(|var| var.dim_names())
    }

    /// Element count implied by a list of dimension names.
    fn element_count(&self, dims: &[String]) -> Result<usize> {
        dims.iter().try_fold(1usize, |acc, name| {
            let dim = self
                .schema
                .get_dim(name)
                .ok_or_else(|| Error::Netcdf(format!("dimension '{name}' does not exist")))?;
            Ok(acc * dim.size())
        })
    }

    /// Add a variable over existing dimensions, stored as `data_type`.
    pub fn add_variable(
        &mut self,
        name: &str,
        dims: &[&str],
        data_type: DataType,
        values: &[f64],
    ) -> Result<()> {
        if self.has_variable(name) {
            return Err(Error::VariableExists(name.to_string()));
        }
        let dims: Vec<String> = dims.iter().map(|d| d.to_string()).collect();
        let expected = self.element_count(&dims)?;
        if values.len() != expected {
            return Err(Error::ShapeMismatch {
                name: name.to_string(),
                expected,
                actual: values.len(),
            });
        }
        let data = values::encode(name, data_type.clone(), values)?;
        self.schema.add_var(name, dims.as_slice(), data_type).map_err(netcdf_error)?;
        self.data.insert(name.to_string(), data);
        Ok(())
    }

    /// Add `name` with the dimensions, type and attributes of `template`.
    pub fn add_variable_like(&mut self, template: &str, name: &str, values: &[f64]) -> Result<()> {
        let var = self
            .schema
            .get_var(template)
            .ok_or_else(|| Error::MissingVariable(template.to_string()))?;
        let dims = var.dim_names();
        let data_type = var.data_type();
        let attributes: Vec<(String, DataVector)> = var
            .get_attrs()
            .into_iter()
            .filter_map(|attr| values::attribute_data(attr).map(|d| (attr.name().to_string(), d)))
            .collect();

        let dims: Vec<&str> = dims.iter().map(String::as_str).collect();
        self.add_variable(name, &dims, data_type, values)?;
        for (attr, data) in attributes {
            self.put_attribute(name, &attr, data)?;
        }
        Ok(())
    }

    /// Rename a variable. Returns `false` when `from` does not exist.
    pub fn rename_variable(&mut self, from: &str, to: &str) -> Result<bool> {
        if !self.has_variable(from) {
            return Ok(false);
        }
        if from == to {
            return Ok(true);
        }
        if self.has_variable(to) {
            return Err(Error::VariableExists(to.to_string()));
        }
        self.schema.rename_var(from, to).map_err(netcdf_error)?;
        if let Some(data) = self.data.remove(from) {
            self.data.insert(to.to_string(), data);
        }
        Ok(true)
    }

    /// Values of a numeric variable converted to `f64`.
    pub fn values(&self, name: &str) -> Result<Vec<f64>> {
        let data = self
            .data
            .get(name)
            .ok_or_else(|| Error::MissingVariable(name.to_string()))?;
        values::decode(name, data)
    }

    /// Replace a variable's values, converted to its stored type.
    pub fn set_values(&mut self, name: &str, values: &[f64]) -> Result<()> {
        let data_type = self
            .data_type(name)
            .ok_or_else(|| Error::MissingVariable(name.to_string()))?;
        let expected = self.data.get(name).map_or(0, DataVector::len);
        if values.len() != expected {
            return Err(Error::ShapeMismatch {
                name: name.to_string(),
                expected,
                actual: values.len(),
            });
        }
        let data = values::encode(name, data_type.clone(), values)?;
        self.data.insert(name.to_string(), data);
        Ok(())
    }

    pub fn has_attribute(&self, var: &str, attr: &str) -> bool {
        self.schema.get_var_attr(var, attr).is_some()
    }

    pub fn text_attribute(&self, var: &str, attr: &str) -> Option<String> {
        self.schema.get_var_attr(var, attr)?.get_as_string()
    }

    pub fn int_attribute(&self, var: &str, attr: &str) -> Option<i32> {
        self.schema.get_var_attr(var, attr)?.get_i32()?.first().copied()
    }

    /// The variable's `_FillValue`, if it has one.
    pub fn fill_value(&self, var: &str) -> Option<f64> {
        let attr = self.schema.get_var_attr(var, FILL_VALUE)?;
        values::attribute_data(attr).and_then(|data| values::first(&data))
    }

    pub fn set_text_attribute(&mut self, var: &str, attr: &str, value: &str) -> Result<()> {
        self.remove_attribute(var, attr)?;
        self.schema
            .add_var_attr_string(var, attr, value)
            .map_err(netcdf_error)
    }

    pub fn set_int_attribute(&mut self, var: &str, attr: &str, value: i32) -> Result<()> {
        self.put_attribute(var, attr, DataVector::I32(vec![value]))
    }

    /// Set `_FillValue` in the variable's own type.
    pub fn set_fill_value(&mut self, var: &str, value: f64) -> Result<()> {
        let data_type = self
            .data_type(var)
            .ok_or_else(|| Error::MissingVariable(var.to_string()))?;
        let data = values::encode(var, data_type, &[value])?;
        self.put_attribute(var, FILL_VALUE, data)
    }

    /// Returns whether the attribute was present.
    pub fn remove_attribute(&mut self, var: &str, attr: &str) -> Result<bool> {
        if !self.has_attribute(var, attr) {
            return Ok(false);
        }
        self.schema.remove_var_attr(var, attr).map_err(netcdf_error)?;
        Ok(true)
    }

    fn put_attribute(&mut self, var: &str, attr: &str, data: DataVector) -> Result<()> {
        self.remove_attribute(var, attr)?;
        match data {
            DataVector::I8(v) => self.schema.add_var_attr_i8(var, attr, v),
            DataVector::U8(v) => self.schema.add_var_attr_u8(var, attr, v),
            DataVector::I16(v) => self.schema.add_var_attr_i16(var, attr, v),
            DataVector::I32(v) => self.schema.add_var_attr_i32(var, attr, v),
            DataVector::F32(v) => self.schema.add_var_attr_f32(var, attr, v),
            DataVector::F64(v) => self.schema.add_var_attr_f64(var, attr, v),
        }
        .map_err(netcdf_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T2: &str = "TMP_2maboveground";

    fn grid() -> Dataset {
        let mut ds = Dataset::new(Version::Classic);
        ds.add_record_dimension("time", 1).unwrap();
        ds.add_dimension("latitude", 2).unwrap();
        ds.add_dimension("longitude", 3).unwrap();
        ds.add_variable(
            T2,
            &["time", "latitude", "longitude"],
            DataType::F32,
            &[280.0, 281.0, 282.0, 283.0, 284.0, 285.0],
        )
        .unwrap();
        ds
    }

    #[test]
    fn test_sniff_versions() {
        assert_eq!(Version::sniff(*b"CDF\x01").unwrap(), Version::Classic);
        assert_eq!(Version::sniff(*b"CDF\x02").unwrap(), Version::Offset64);
        assert!(matches!(
            Version::sniff(*b"CDF\x05"),
            Err(Error::UnsupportedVersion(5))
        ));
        assert!(matches!(Version::sniff(*HDF5_MAGIC), Err(Error::Hdf5Unsupported)));
        assert!(matches!(Version::sniff(*b"GRIB"), Err(Error::BadMagic(_))));
    }

    #[test]
    fn test_values_round_trip_through_type() {
        let mut ds = Dataset::new(Version::Classic);
        ds.add_dimension("x", 2).unwrap();
        ds.add_variable("s", &["x"], DataType::I16, &[1.9, -2.9]).unwrap();
        assert_eq!(ds.values("s").unwrap(), vec![1.0, -2.0]);
    }

    #[test]
    fn test_char_is_not_numeric() {
        let mut ds = Dataset::new(Version::Classic);
        ds.add_dimension("n", 1).unwrap();
        assert!(matches!(
            ds.add_variable("name", &["n"], DataType::U8, &[1.0]),
            Err(Error::NotNumeric(_))
        ));
    }

    #[test]
    fn test_set_values_checks_length() {
        let mut ds = grid();
        let err = ds.set_values(T2, &[1.0]).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { expected: 6, .. }));
    }

    #[test]
    fn test_add_variable_validates_shape() {
        let mut ds = grid();
        assert!(matches!(
            ds.add_variable("bad", &["time", "latitude", "longitude"], DataType::F32, &[0.0; 5]),
            Err(Error::ShapeMismatch { expected: 6, actual: 5, .. })
        ));
        assert!(matches!(
            ds.add_variable(T2, &["time", "latitude", "longitude"], DataType::F32, &[0.0; 6]),
            Err(Error::VariableExists(_))
        ));
        assert!(ds.add_variable("u", &["depth"], DataType::F32, &[0.0]).is_err());
    }

    #[test]
    fn test_rename_variable() {
        let mut ds = grid();
        assert!(ds.rename_variable(T2, "T2").unwrap());
        assert!(ds.has_variable("T2"));
        assert!(!ds.has_variable(T2));
        assert_eq!(ds.values("T2").unwrap()[0], 280.0);
        assert!(!ds.rename_variable("missing", "other").unwrap());

        ds.add_variable("U", &["time", "latitude", "longitude"], DataType::F32, &[0.0; 6])
            .unwrap();
        assert!(matches!(ds.rename_variable("U", "T2"), Err(Error::VariableExists(_))));
    }

    #[test]
    fn test_dimension_queries() {
        let ds = grid();
        assert!(ds.has_dimensions(&["latitude", "longitude", "time"]));
        assert!(!ds.has_dimensions(&["latitude", "depth"]));
        assert_eq!(
            ds.dimension_names(T2).unwrap(),
            vec!["time", "latitude", "longitude"]
        );
    }

    #[test]
    fn test_attributes_are_replaced() {
        let mut ds = grid();
        ds.set_text_attribute(T2, "units", "K").unwrap();
        ds.set_text_attribute(T2, "units", "degC").unwrap();
        assert_eq!(ds.text_attribute(T2, "units").as_deref(), Some("degC"));

        assert_eq!(ds.int_attribute(T2, "interval"), None);
        ds.set_int_attribute(T2, "interval", 3).unwrap();
        ds.set_int_attribute(T2, "interval", 6).unwrap();
        assert_eq!(ds.int_attribute(T2, "interval"), Some(6));
    }

    #[test]
    fn test_fill_value() {
        let mut ds = grid();
        assert_eq!(ds.fill_value(T2), None);
        ds.set_fill_value(T2, 9.999e20).unwrap();
        assert_eq!(ds.fill_value(T2), Some(f64::from(9.999e20_f32)));
    }

    #[test]
    fn test_add_variable_like_copies_template() {
        let mut ds = grid();
        ds.set_text_attribute(T2, "level", "2 m above ground").unwrap();
        ds.set_fill_value(T2, 9.999e20).unwrap();

        ds.add_variable_like(T2, "copy", &[0.0; 6]).unwrap();
        assert_eq!(ds.data_type("copy"), Some(DataType::F32));
        assert_eq!(ds.dimension_names("copy"), ds.dimension_names(T2));
        assert_eq!(
            ds.text_attribute("copy", "level").as_deref(),
            Some("2 m above ground")
        );
        assert_eq!(ds.fill_value("copy"), ds.fill_value(T2));
        assert!(matches!(
            ds.add_variable_like("missing", "other", &[0.0]),
            Err(Error::MissingVariable(_))
        ));
    }
}
