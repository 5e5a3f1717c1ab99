//! Pre-flight check for block state before it is rendered as JSON.
//!
//! `serde_json` writes `NaN` and infinities as `null`, which would give a
//! diverged model the same canonical form as an unset one. [`check_finite`]
//! walks the state through a serializer that only looks at floats and fails on
//! the first one JSON cannot represent.

use serde::Serialize;
use serde::ser::{self, Error as _};

type Checked = Result<(), serde_json::Error>;

pub(crate) fn check_finite<T: Serialize + ?Sized>(state: &T) -> Checked {
    state.serialize(FiniteFloats)
}

fn check(value: f64) -> Checked {
    if value.is_finite() {
        Ok(())
    } else {
        Err(serde_json::Error::custom(format!(
            "{value} has no JSON representation"
        )))
    }
}

struct FiniteFloats;

impl ser::Serializer for FiniteFloats {
    type Ok = ();
    type Error = serde_json::Error;
    type SerializeSeq = Self;
    type SerializeTuple = Self;
    type SerializeTupleStruct = Self;
    type SerializeTupleVariant = Self;
    type SerializeMap = Self;
    type SerializeStruct = Self;
    type SerializeStructVariant = Self;

    fn serialize_bool(self, _v: bool) -> Checked {
        Ok(())
    }

    fn serialize_i8(self, _v: i8) -> Checked {
        Ok(())
    }

    fn serialize_i16(self, _v: i16) -> Checked {
        Ok(())
    }

    fn serialize_i32(self, _v: i32) -> Checked {
        Ok(())
    }

    fn serialize_i64(self, _v: i64) -> Checked {
        Ok(())
    }

    fn serialize_i128(self, _v: i128) -> Checked {
        Ok(())
    }

    fn serialize_u8(self, _v: u8) -> Checked {
        Ok(())
    }

    fn serialize_u16(self, _v: u16) -> Checked {
        Ok(())
    }

    fn serialize_u32(self, _v: u32) -> Checked {
        Ok(())
    }

    fn serialize_u64(self, _v: u64) -> Checked {
        Ok(())
    }

    fn serialize_u128(self, _v: u128) -> Checked {
        Ok(())
    }

    fn serialize_f32(self, v: f32) -> Checked {
        check(f64::from(v))
    }

    fn serialize_f64(self, v: f64) -> Checked {
        check(v)
    }

    fn serialize_char(self, _v: char) -> Checked {
        Ok(())
    }

    fn serialize_str(self, _v: &str) -> Checked {
        Ok(())
    }

    fn serialize_bytes(self, _v: &[u8]) -> Checked {
        Ok(())
    }

    fn serialize_none(self) -> Checked {
        Ok(())
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Checked {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Checked {
        Ok(())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Checked {
        Ok(())
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
    ) -> Checked {
        Ok(())
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Checked {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        value: &T,
    ) -> Checked {
        value.serialize(self)
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self, serde_json::Error> {
        Ok(self)
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self, serde_json::Error> {
        Ok(self)
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self, serde_json::Error> {
        Ok(self)
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self, serde_json::Error> {
        Ok(self)
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self, serde_json::Error> {
        Ok(self)
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Self, serde_json::Error> {
        Ok(self)
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self, serde_json::Error> {
        Ok(self)
    }
}

impl ser::SerializeSeq for FiniteFloats {
    type Ok = ();
    type Error = serde_json::Error;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Checked {
        value.serialize(FiniteFloats)
    }

    fn end(self) -> Checked {
        Ok(())
    }
}

impl ser::SerializeTuple for FiniteFloats {
    type Ok = ();
    type Error = serde_json::Error;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Checked {
        value.serialize(FiniteFloats)
    }

    fn end(self) -> Checked {
        Ok(())
    }
}

impl ser::SerializeTupleStruct for FiniteFloats {
    type Ok = ();
    type Error = serde_json::Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Checked {
        value.serialize(FiniteFloats)
    }

    fn end(self) -> Checked {
        Ok(())
    }
}

impl ser::SerializeTupleVariant for FiniteFloats {
    type Ok = ();
    type Error = serde_json::Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Checked {
        value.serialize(FiniteFloats)
    }

    fn end(self) -> Checked {
        Ok(())
    }
}

impl ser::SerializeMap for FiniteFloats {
    type Ok = ();
    type Error = serde_json::Error;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Checked {
        key.serialize(FiniteFloats)
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Checked {
        value.serialize(FiniteFloats)
    }

    fn end(self) -> Checked {
        Ok(())
    }
}

impl ser::SerializeStruct for FiniteFloats {
    type Ok = ();
    type Error = serde_json::Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, _key: &'static str, value: &T) -> Checked {
        value.serialize(FiniteFloats)
    }

    fn end(self) -> Checked {
        Ok(())
    }
}

impl ser::SerializeStructVariant for FiniteFloats {
    type Ok = ();
    type Error = serde_json::Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, _key: &'static str, value: &T) -> Checked {
        value.serialize(FiniteFloats)
    }

    fn end(self) -> Checked {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[derive(Serialize)]
    enum Shape {
        Point { weight: f32 },
        Pair(f64, f64),
    }

    #[test]
    fn test_finite_state_passes() {
        assert!(check_finite(&vec![1.0, -2.5, 0.0]).is_ok());
        assert!(check_finite(&Some(f64::MAX)).is_ok());
        assert!(check_finite(&Option::<f64>::None).is_ok());
        assert!(check_finite(&("label", 3u128, 'x')).is_ok());
    }

    #[test]
    fn test_nested_non_finite_values_are_found() {
        let mut weights = BTreeMap::new();
        weights.insert("bias", vec![0.5, f64::NAN]);
        assert!(check_finite(&weights).is_err());

        assert!(check_finite(&Shape::Point { weight: f32::INFINITY }).is_err());
        assert!(check_finite(&Shape::Pair(1.0, f64::NEG_INFINITY)).is_err());
        assert!(check_finite(&Shape::Pair(1.0, 2.0)).is_ok());
    }

    #[test]
    fn test_error_names_the_value() {
        let err = check_finite(&f64::NEG_INFINITY).unwrap_err();
        assert!(err.to_string().contains("-inf"));
    }
}
