use super::PlyError;

/// The scalar types of the PLY format.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum PlyDataType {
    /// 32-bit float.
    Float32,
    /// 64-bit float.
    Float64,
    /// Signed byte.
    Int8,
    /// Unsigned byte.
    UInt8,
    /// Signed 16-bit integer.
    Int16,
    /// Unsigned 16-bit integer.
    UInt16,
    /// Signed 32-bit integer.
    Int32,
    /// Unsigned 32-bit integer.
    UInt32,
}

impl PlyDataType {
    /// Parse a type name as it appears in a PLY header.
    pub fn parse(type_str: &str) -> Result<Self, PlyError> {
        match type_str {
            "float" | "float32" => Ok(PlyDataType::Float32),
            "double" | "float64" => Ok(PlyDataType::Float64),
            "char" | "int8" => Ok(PlyDataType::Int8),
            "uchar" | "uint8" => Ok(PlyDataType::UInt8),
            "short" | "int16" => Ok(PlyDataType::Int16),
            "ushort" | "uint16" => Ok(PlyDataType::UInt16),
            "int" | "int32" => Ok(PlyDataType::Int32),
            "uint" | "uint32" => Ok(PlyDataType::UInt32),
            _ => Err(PlyError::UnsupportedProperty(type_str.to_string())),
        }
    }

    /// Size in bytes of a binary value.
    pub fn size(&self) -> usize {
        match self {
            PlyDataType::Float32 | PlyDataType::Int32 | PlyDataType::UInt32 => 4,
            PlyDataType::Float64 => 8,
            PlyDataType::Int16 | PlyDataType::UInt16 => 2,
            PlyDataType::Int8 | PlyDataType::UInt8 => 1,
        }
    }

    /// Decode a little endian value.
    ///
    /// PRECONDITION: `bytes` has exactly [`PlyDataType::size`] bytes.
    pub fn from_le_bytes(&self, bytes: &[u8]) -> f64 {
        let mut buf = [0u8; 8];
        buf[..bytes.len()].copy_from_slice(bytes);
        match self {
            PlyDataType::Float32 => f32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as f64,
            PlyDataType::Float64 => f64::from_le_bytes(buf),
            PlyDataType::Int8 => buf[0] as i8 as f64,
            PlyDataType::UInt8 => buf[0] as f64,
            PlyDataType::Int16 => i16::from_le_bytes([buf[0], buf[1]]) as f64,
            PlyDataType::UInt16 => u16::from_le_bytes([buf[0], buf[1]]) as f64,
            PlyDataType::Int32 => i32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as f64,
            PlyDataType::UInt32 => u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as f64,
        }
    }

    /// Decode a big endian value.
    ///
    /// PRECONDITION: `bytes` has exactly [`PlyDataType::size`] bytes.
    pub fn from_be_bytes(&self, bytes: &[u8]) -> f64 {
        let mut reversed = [0u8; 8];
        for (dst, src) in reversed.iter_mut().zip(bytes.iter().rev()) {
            *dst = *src;
        }
        self.from_le_bytes(&reversed[..bytes.len()])
    }
}

/// A property of a PLY element.
#[derive(Debug, PartialEq, Clone)]
pub enum PlyProperty {
    /// A single value.
    Scalar {
        /// Property name.
        name: String,
        /// Value type.
        data_type: PlyDataType,
    },
    /// A variable length list, prefixed by its length.
    List {
        /// Property name.
        name: String,
        /// Type of the length prefix.
        count_type: PlyDataType,
        /// Type of the items.
        item_type: PlyDataType,
    },
}

impl PlyProperty {
    /// The property name.
    pub fn name(&self) -> &str {
        match self {
            PlyProperty::Scalar { name, .. } | PlyProperty::List { name, .. } => name,
        }
    }
}

/// An element declared in the PLY header, e.g. `vertex` or `face`.
#[derive(Debug, PartialEq, Clone)]
pub struct PlyElement {
    /// Element name.
    pub name: String,
    /// Number of records in the body.
    pub count: usize,
    /// Properties of a record, in file order.
    pub properties: Vec<PlyProperty>,
}

impl PlyElement {
    /// Position of the scalar property with the given name.
    pub fn scalar_index(&self, name: &str) -> Option<usize> {
        self.properties
            .iter()
            .position(|p| matches!(p, PlyProperty::Scalar { .. }) && p.name() == name)
    }

    /// Position of the first list property with one of the given names.
    pub fn list_index(&self, names: &[&str]) -> Option<usize> {
        self.properties
            .iter()
            .position(|p| matches!(p, PlyProperty::List { .. }) && names.contains(&p.name()))
    }
}

/// Storage format of the PLY body.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum PlyFormat {
    /// Whitespace separated text.
    Ascii,
    /// Packed little endian binary.
    BinaryLittleEndian,
    /// Packed big endian binary.
    BinaryBigEndian,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_be_bytes() {
        assert_eq!(PlyDataType::Float32.from_be_bytes(&1.5f32.to_be_bytes()), 1.5);
        assert_eq!(PlyDataType::Float64.from_be_bytes(&(-2.25f64).to_be_bytes()), -2.25);
        assert_eq!(PlyDataType::Int16.from_be_bytes(&(-300i16).to_be_bytes()), -300.0);
        assert_eq!(PlyDataType::UInt32.from_be_bytes(&70000u32.to_be_bytes()), 70000.0);
        assert_eq!(PlyDataType::UInt8.from_be_bytes(&[200]), 200.0);
    }
}
