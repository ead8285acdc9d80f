use std::io::{BufRead, Read};
use std::path::Path;

use super::{
    properties::{PlyDataType, PlyElement, PlyFormat, PlyProperty},
    PlyError,
};
use crate::mesh::TriangleMesh;

struct PlyHeader {
    pub format: PlyFormat,
    pub elements: Vec<PlyElement>,
}

fn parse_header<R: BufRead>(reader: &mut R) -> Result<PlyHeader, PlyError> {
    let mut line = String::new();
    let mut format = None;
    let mut elements: Vec<PlyElement> = Vec::new();

    reader.read_line(&mut line)?;
    if line.trim() != "ply" {
        return Err(PlyError::InvalidHeader("missing 'ply' magic".to_string()));
    }

    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Err(PlyError::InvalidHeader("missing 'end_header'".to_string()));
        }
        let parts = line.split_whitespace().collect::<Vec<_>>();

        match parts.as_slice() {
            ["end_header"] => break,
            [] | ["comment", ..] | ["obj_info", ..] => {}
            ["format", "ascii", _] => format = Some(PlyFormat::Ascii),
            ["format", "binary_little_endian", _] => format = Some(PlyFormat::BinaryLittleEndian),
            ["format", "binary_big_endian", _] => format = Some(PlyFormat::BinaryBigEndian),
            ["format", other, ..] => return Err(PlyError::UnsupportedFormat(other.to_string())),
            ["element", name, count] => {
                let count = count
                    .parse()
                    .map_err(|_| PlyError::InvalidHeader(format!("bad element count: {count}")))?;
                elements.push(PlyElement {
                    name: name.to_string(),
                    count,
                    properties: Vec::new(),
                });
            }
            ["property", "list", count_type, item_type, name] => {
                let property = PlyProperty::List {
                    name: name.to_string(),
                    count_type: PlyDataType::parse(count_type)?,
                    item_type: PlyDataType::parse(item_type)?,
                };
                push_property(&mut elements, property)?;
            }
            ["property", data_type, name] => {
                let property = PlyProperty::Scalar {
                    name: name.to_string(),
                    data_type: PlyDataType::parse(data_type)?,
                };
                push_property(&mut elements, property)?;
            }
            _ => {
                return Err(PlyError::InvalidHeader(format!(
                    "unexpected line: {}",
                    line.trim()
                )))
            }
        }
    }

    let format = format.ok_or_else(|| PlyError::InvalidHeader("missing format".to_string()))?;
    Ok(PlyHeader { format, elements })
}

fn push_property(elements: &mut [PlyElement], property: PlyProperty) -> Result<(), PlyError> {
    let element = elements.last_mut().ok_or_else(|| {
        PlyError::InvalidHeader(format!("property '{}' outside an element", property.name()))
    })?;
    element.properties.push(property);
    Ok(())
}

/// A decoded property value.
enum PlyValue {
    Scalar(f64),
    List(Vec<f64>),
}

/// Source of property values for the body of a PLY file.
trait ValueReader {
    fn read_scalar(&mut self, data_type: PlyDataType) -> Result<f64, PlyError>;

    fn read_value(&mut self, property: &PlyProperty) -> Result<PlyValue, PlyError> {
        match property {
            PlyProperty::Scalar { data_type, .. } => Ok(PlyValue::Scalar(self.read_scalar(*data_type)?)),
            PlyProperty::List {
                count_type,
                item_type,
                ..
            } => {
                let count = self.read_scalar(*count_type)?;
                if count < 0.0 {
                    return Err(PlyError::InvalidData(format!("negative list length {count}")));
                }
                let items = (0..count as usize)
                    .map(|_| self.read_scalar(*item_type))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(PlyValue::List(items))
            }
        }
    }
}

struct BinaryReader<R: Read> {
    reader: R,
    buffer: [u8; 8],
    big_endian: bool,
}

impl<R: Read> ValueReader for BinaryReader<R> {
    fn read_scalar(&mut self, data_type: PlyDataType) -> Result<f64, PlyError> {
        let bytes = &mut self.buffer[..data_type.size()];
        self.reader.read_exact(bytes)?;
        Ok(if self.big_endian {
            data_type.from_be_bytes(bytes)
        } else {
            data_type.from_le_bytes(bytes)
        })
    }
}

struct AsciiReader<'a> {
    tokens: std::str::SplitWhitespace<'a>,
}

impl ValueReader for AsciiReader<'_> {
    fn read_scalar(&mut self, _data_type: PlyDataType) -> Result<f64, PlyError> {
        let token = self
            .tokens
            .next()
            .ok_or_else(|| PlyError::InvalidData("unexpected end of file".to_string()))?;
        token
            .parse()
            .map_err(|_| PlyError::InvalidData(format!("invalid number: {token}")))
    }
}

fn to_vertex_index(value: f64) -> Result<usize, PlyError> {
    if value < 0.0 || value.fract() != 0.0 {
        return Err(PlyError::InvalidData(format!("invalid vertex index {value}")));
    }
    Ok(value as usize)
}

fn read_body(header: &PlyHeader, values: &mut dyn ValueReader) -> Result<TriangleMesh, PlyError> {
    let vertex_element = header
        .elements
        .iter()
        .find(|e| e.name == "vertex")
        .ok_or_else(|| PlyError::InvalidHeader("no vertex element".to_string()))?;
    let xyz = [
        vertex_element
            .scalar_index("x")
            .ok_or(PlyError::MissingVertexProperty("x"))?,
        vertex_element
            .scalar_index("y")
            .ok_or(PlyError::MissingVertexProperty("y"))?,
        vertex_element
            .scalar_index("z")
            .ok_or(PlyError::MissingVertexProperty("z"))?,
    ];

    let mut vertices = Vec::with_capacity(vertex_element.count);
    let mut triangles = Vec::new();

    for element in header.elements.iter() {
        let face_list = match element.name.as_str() {
            "face" => element.list_index(&["vertex_indices", "vertex_index"]),
            _ => None,
        };

        for _ in 0..element.count {
            let record = element
                .properties
                .iter()
                .map(|p| values.read_value(p))
                .collect::<Result<Vec<_>, _>>()?;

            if element.name == "vertex" {
                let mut point = [0.0; 3];
                for (dst, &i) in point.iter_mut().zip(xyz.iter()) {
                    if let PlyValue::Scalar(v) = record[i] {
                        *dst = v;
                    }
                }
                vertices.push(point);
            } else if let Some(PlyValue::List(indices)) = face_list.map(|i| &record[i]) {
                let indices = indices
                    .iter()
                    .map(|&v| to_vertex_index(v))
                    .collect::<Result<Vec<_>, _>>()?;
                // fan triangulation of polygons
                for k in 1..indices.len().saturating_sub(1) {
                    triangles.push([indices[0], indices[k], indices[k + 1]]);
                }
            }
        }
    }

    Ok(TriangleMesh::new(vertices, triangles)?)
}

/// Read a triangle mesh from a PLY file.
///
/// The `ascii` and binary (little or big endian) formats are supported. Vertex positions are
/// taken from the `x`, `y`, `z` properties of the `vertex` element and polygons from the
/// `vertex_indices` list of the `face` element, triangulated as fans. Other elements and
/// properties are skipped.
///
/// # Arguments
///
/// * `path` - The path to the PLY file.
///
/// # Returns
///
/// The triangle mesh.
pub fn read_ply_mesh(path: impl AsRef<Path>) -> Result<TriangleMesh, PlyError> {
    let file = std::fs::File::open(path)?;
    let mut reader = std::io::BufReader::new(file);
    let header = parse_header(&mut reader)?;

    let mesh = match header.format {
        PlyFormat::BinaryLittleEndian | PlyFormat::BinaryBigEndian => {
            let mut values = BinaryReader {
                reader,
                buffer: [0u8; 8],
                big_endian: header.format == PlyFormat::BinaryBigEndian,
            };
            read_body(&header, &mut values)?
        }
        PlyFormat::Ascii => {
            let mut body = String::new();
            reader.read_to_string(&mut body)?;
            let mut values = AsciiReader {
                tokens: body.split_whitespace(),
            };
            read_body(&header, &mut values)?
        }
    };

    log::debug!(
        "Read PLY mesh with {} vertices and {} triangles",
        mesh.vertices.len(),
        mesh.triangles.len()
    );

    Ok(mesh)
}
