// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Contains the `Array` storage used by 1-D and N-D array variants.

use std::fmt;

use crate::variant::{Variant, VariantScalarTypeId};

/// Error returned when constructing an invalid array.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArrayError {
    /// A value does not match the array's element type.
    #[error("A value in the array does not match the array element type")]
    ValueTypeMismatch,
    /// The product of the dimensions does not equal the number of values.
    #[error("The product of the array dimensions does not equal the flat value count")]
    DimensionMismatch,
    /// One of the dimensions is zero.
    #[error("Array dimensions must all be non-zero")]
    ZeroDimension,
}

/// An array of variant values, all of the same scalar type. A one dimensional array has no
/// `dimensions`; a multi dimensional array stores its values flattened with the shape in
/// `dimensions`, whose product must equal the flat length.
#[derive(Debug, Clone, PartialEq)]
pub struct Array {
    /// The element type of the array.
    pub value_type: VariantScalarTypeId,
    /// Values, flattened for a multi dimensional array.
    pub values: Vec<Variant>,
    /// The shape of a multi dimensional array, `None` for one dimension.
    pub dimensions: Option<Vec<u32>>,
}

impl fmt::Display for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Array[{:?}; {}]", self.value_type, self.values.len())
    }
}

impl Array {
    /// Constructs a single dimension array from the values.
    pub fn new(
        value_type: VariantScalarTypeId,
        values: impl Into<Vec<Variant>>,
    ) -> Result<Array, ArrayError> {
        let values = values.into();
        Self::validate_values(value_type, &values)?;
        Ok(Array {
            value_type,
            values,
            dimensions: None,
        })
    }

    /// Constructs a multi dimensional array from the flattened values and a shape.
    /// An empty `dimensions` produces a single dimension array.
    pub fn new_multi(
        value_type: VariantScalarTypeId,
        values: impl Into<Vec<Variant>>,
        dimensions: impl Into<Vec<u32>>,
    ) -> Result<Array, ArrayError> {
        let values = values.into();
        let dimensions = dimensions.into();
        Self::validate_values(value_type, &values)?;
        if dimensions.is_empty() {
            return Ok(Array {
                value_type,
                values,
                dimensions: None,
            });
        }
        if dimensions.iter().any(|d| *d == 0) {
            return Err(ArrayError::ZeroDimension);
        }
        let mut len = 1u64;
        for d in &dimensions {
            len = len.saturating_mul(u64::from(*d));
        }
        if len != values.len() as u64 {
            return Err(ArrayError::DimensionMismatch);
        }
        Ok(Array {
            value_type,
            values,
            dimensions: Some(dimensions),
        })
    }

    /// Tests that the variants in the slice all have the expected scalar type.
    fn validate_values(
        value_type: VariantScalarTypeId,
        values: &[Variant],
    ) -> Result<(), ArrayError> {
        if values
            .iter()
            .all(|v| v.scalar_type_id() == Some(value_type))
        {
            Ok(())
        } else {
            Err(ArrayError::ValueTypeMismatch)
        }
    }

    /// `true` if this array carries dimensions.
    pub fn has_dimensions(&self) -> bool {
        self.dimensions.as_ref().map_or(false, |d| !d.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimension_product_invariant() {
        let values = vec![Variant::from(1i32), Variant::from(2i32), Variant::from(3i32)];
        assert!(Array::new_multi(VariantScalarTypeId::Int32, values.clone(), vec![3]).is_ok());
        assert_eq!(
            Array::new_multi(VariantScalarTypeId::Int32, values.clone(), vec![2, 2]),
            Err(ArrayError::DimensionMismatch)
        );
        assert_eq!(
            Array::new_multi(VariantScalarTypeId::Int32, values, vec![0, 3]),
            Err(ArrayError::ZeroDimension)
        );
    }

    #[test]
    fn element_types_must_match() {
        let values = vec![Variant::from(1i32), Variant::from("two")];
        assert_eq!(
            Array::new(VariantScalarTypeId::Int32, values),
            Err(ArrayError::ValueTypeMismatch)
        );
    }
}
