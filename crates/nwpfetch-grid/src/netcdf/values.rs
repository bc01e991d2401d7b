use netcdf3::{Attribute, DataType, DataVector};

use crate::{Error, Result};

/// Stored values widened to `f64`. Text is rejected.
pub(crate) fn decode(name: &str, data: &DataVector) -> Result<Vec<f64>> {
    Ok(match data {
        DataVector::I8(v) => v.iter().map(|&x| f64::from(x)).collect(),
        DataVector::I16(v) => v.iter().map(|&x| f64::from(x)).collect(),
        DataVector::I32(v) => v.iter().map(|&x| f64::from(x)).collect(),
        DataVector::F32(v) => v.iter().map(|&x| f64::from(x)).collect(),
        DataVector::F64(v) => v.clone(),
        DataVector::U8(_) => return Err(Error::NotNumeric(name.to_string())),
    })
}

/// `values` narrowed to `data_type`. Integer types round toward zero.
pub(crate) fn encode(name: &str, data_type: DataType, values: &[f64]) -> Result<DataVector> {
    Ok(match data_type {
        DataType::I8 => DataVector::I8(values.iter().map(|&x| x as i8).collect()),
        DataType::I16 => DataVector::I16(values.iter().map(|&x| x as i16).collect()),
        DataType::I32 => DataVector::I32(values.iter().map(|&x| x as i32).collect()),
        DataType::F32 => DataVector::F32(values.iter().map(|&x| x as f32).collect()),
        DataType::F64 => DataVector::F64(values.to_vec()),
        DataType::U8 => return Err(Error::NotNumeric(name.to_string())),
    })
}

/// A copy of an attribute's values.
pub(crate) fn attribute_data(attr: &Attribute) -> Option<DataVector> {
    Some(match attr.data_type() {
        DataType::I8 => DataVector::I8(attr.get_i8()?.to_vec()),
        DataType::U8 => DataVector::U8(attr.get_u8()?.to_vec()),
        DataType::I16 => DataVector::I16(attr.get_i16()?.to_vec()),
        DataType::I32 => DataVector::I32(attr.get_i32()?.to_vec()),
        DataType::F32 => DataVector::F32(attr.get_f32()?.to_vec()),
        DataType::F64 => DataVector::F64(attr.get_f64()?.to_vec()),
    })
}

/// First numeric element, if any.
pub(crate) fn first(data: &DataVector) -> Option<f64> {
    decode("", data).ok()?.first().copied()
}
