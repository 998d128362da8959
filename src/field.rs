use glam::{Vec2, Vec3, Vec4};
use uuid::Uuid;

/// Staging capacity for one field value. Vector4/Color4 and entity ids are the
/// widest representations at 16 bytes; every tag fits by construction.
pub const FIELD_BUFFER_CAPACITY: usize = 16;

/// Native type tag for one exposed script field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldTypeTag {
    /// Unsupported script type. Retained in descriptors, never marshalled.
    None,
    Float,
    Double,
    Bool,
    Char,
    Short,
    Int,
    Long,
    Byte,
    UShort,
    UInt,
    ULong,
    Vector2,
    Vector3,
    Vector4,
    Color3,
    Color4,
    EntityReference,
    AssetHandle,
}

impl FieldTypeTag {
    pub const fn byte_len(self) -> usize {
        match self {
            FieldTypeTag::None => 0,
            FieldTypeTag::Bool | FieldTypeTag::Byte => 1,
            FieldTypeTag::Short | FieldTypeTag::UShort => 2,
            FieldTypeTag::Float | FieldTypeTag::Char | FieldTypeTag::Int | FieldTypeTag::UInt => 4,
            FieldTypeTag::Double
            | FieldTypeTag::Long
            | FieldTypeTag::ULong
            | FieldTypeTag::Vector2
            | FieldTypeTag::AssetHandle => 8,
            FieldTypeTag::Vector3 | FieldTypeTag::Color3 => 12,
            FieldTypeTag::Vector4 | FieldTypeTag::Color4 | FieldTypeTag::EntityReference => 16,
        }
    }

    pub fn marshals(self) -> bool {
        self != FieldTypeTag::None
    }

    pub fn label(self) -> &'static str {
        match self {
            FieldTypeTag::None => "none",
            FieldTypeTag::Float => "float",
            FieldTypeTag::Double => "double",
            FieldTypeTag::Bool => "bool",
            FieldTypeTag::Char => "char",
            FieldTypeTag::Short => "short",
            FieldTypeTag::Int => "int",
            FieldTypeTag::Long => "long",
            FieldTypeTag::Byte => "byte",
            FieldTypeTag::UShort => "ushort",
            FieldTypeTag::UInt => "uint",
            FieldTypeTag::ULong => "ulong",
            FieldTypeTag::Vector2 => "vec2",
            FieldTypeTag::Vector3 => "vec3",
            FieldTypeTag::Vector4 => "vec4",
            FieldTypeTag::Color3 => "color3",
            FieldTypeTag::Color4 => "color4",
            FieldTypeTag::EntityReference => "entity",
            FieldTypeTag::AssetHandle => "asset",
        }
    }
}

/// RGB color field value, distinct from `Vec3` so the registry can tag it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color3 {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color3 {
    pub fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }
}

/// RGBA color field value, distinct from `Vec4` so the registry can tag it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color4 {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color4 {
    pub fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }
}

/// Reference to another entity, stored as its stable scene UUID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityRef(pub Uuid);

impl EntityRef {
    pub fn nil() -> Self {
        Self(Uuid::nil())
    }
}

/// Opaque handle to an engine asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AssetHandle(pub u64);

/// One field value in its native representation. The variant fixes the tag and
/// the byte size, so an oversized value cannot be constructed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    Float(f32),
    Double(f64),
    Bool(bool),
    Char(char),
    Short(i16),
    Int(i32),
    Long(i64),
    Byte(u8),
    UShort(u16),
    UInt(u32),
    ULong(u64),
    Vector2(Vec2),
    Vector3(Vec3),
    Vector4(Vec4),
    Color3(Color3),
    Color4(Color4),
    Entity(EntityRef),
    Asset(AssetHandle),
}

impl FieldValue {
    pub fn tag(&self) -> FieldTypeTag {
        match self {
            FieldValue::Float(_) => FieldTypeTag::Float,
            FieldValue::Double(_) => FieldTypeTag::Double,
            FieldValue::Bool(_) => FieldTypeTag::Bool,
            FieldValue::Char(_) => FieldTypeTag::Char,
            FieldValue::Short(_) => FieldTypeTag::Short,
            FieldValue::Int(_) => FieldTypeTag::Int,
            FieldValue::Long(_) => FieldTypeTag::Long,
            FieldValue::Byte(_) => FieldTypeTag::Byte,
            FieldValue::UShort(_) => FieldTypeTag::UShort,
            FieldValue::UInt(_) => FieldTypeTag::UInt,
            FieldValue::ULong(_) => FieldTypeTag::ULong,
            FieldValue::Vector2(_) => FieldTypeTag::Vector2,
            FieldValue::Vector3(_) => FieldTypeTag::Vector3,
            FieldValue::Vector4(_) => FieldTypeTag::Vector4,
            FieldValue::Color3(_) => FieldTypeTag::Color3,
            FieldValue::Color4(_) => FieldTypeTag::Color4,
            FieldValue::Entity(_) => FieldTypeTag::EntityReference,
            FieldValue::Asset(_) => FieldTypeTag::AssetHandle,
        }
    }
}

/// Fixed-capacity staging buffer for one field value, tagged with its type.
/// Only constructible from a [`FieldValue`], which keeps the implied byte
/// length within capacity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldValueBuffer {
    tag: FieldTypeTag,
    bytes: [u8; FIELD_BUFFER_CAPACITY],
}

impl FieldValueBuffer {
    pub fn tag(&self) -> FieldTypeTag {
        self.tag
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes[..self.tag.byte_len()]
    }

    pub fn decode(&self) -> FieldValue {
        let b = &self.bytes;
        match self.tag {
            FieldTypeTag::Float => FieldValue::Float(f32::from_le_bytes(read::<4>(b))),
            FieldTypeTag::Double => FieldValue::Double(f64::from_le_bytes(read::<8>(b))),
            FieldTypeTag::Bool => FieldValue::Bool(b[0] != 0),
            FieldTypeTag::Char => {
                FieldValue::Char(char::from_u32(u32::from_le_bytes(read::<4>(b))).unwrap_or('\0'))
            }
            FieldTypeTag::Short => FieldValue::Short(i16::from_le_bytes(read::<2>(b))),
            FieldTypeTag::Int => FieldValue::Int(i32::from_le_bytes(read::<4>(b))),
            FieldTypeTag::Long => FieldValue::Long(i64::from_le_bytes(read::<8>(b))),
            FieldTypeTag::Byte => FieldValue::Byte(b[0]),
            FieldTypeTag::UShort => FieldValue::UShort(u16::from_le_bytes(read::<2>(b))),
            FieldTypeTag::UInt => FieldValue::UInt(u32::from_le_bytes(read::<4>(b))),
            FieldTypeTag::ULong => FieldValue::ULong(u64::from_le_bytes(read::<8>(b))),
            FieldTypeTag::Vector2 => FieldValue::Vector2(Vec2::from_array(read_f32s::<2>(b))),
            FieldTypeTag::Vector3 => FieldValue::Vector3(Vec3::from_array(read_f32s::<3>(b))),
            FieldTypeTag::Vector4 => FieldValue::Vector4(Vec4::from_array(read_f32s::<4>(b))),
            FieldTypeTag::Color3 => {
                let [r, g, b] = read_f32s::<3>(b);
                FieldValue::Color3(Color3::new(r, g, b))
            }
            FieldTypeTag::Color4 => {
                let [r, g, b, a] = read_f32s::<4>(b);
                FieldValue::Color4(Color4::new(r, g, b, a))
            }
            FieldTypeTag::EntityReference => {
                FieldValue::Entity(EntityRef(Uuid::from_bytes(read::<16>(b))))
            }
            FieldTypeTag::AssetHandle => FieldValue::Asset(AssetHandle(u64::from_le_bytes(read::<8>(b)))),
            // None is unreachable: no FieldValue variant produces it.
            FieldTypeTag::None => FieldValue::Long(0),
        }
    }
}

impl From<FieldValue> for FieldValueBuffer {
    fn from(value: FieldValue) -> Self {
        let tag = value.tag();
        let mut bytes = [0u8; FIELD_BUFFER_CAPACITY];
        match value {
            FieldValue::Float(v) => write(&mut bytes, &v.to_le_bytes()),
            FieldValue::Double(v) => write(&mut bytes, &v.to_le_bytes()),
            FieldValue::Bool(v) => bytes[0] = v as u8,
            FieldValue::Char(v) => write(&mut bytes, &(v as u32).to_le_bytes()),
            FieldValue::Short(v) => write(&mut bytes, &v.to_le_bytes()),
            FieldValue::Int(v) => write(&mut bytes, &v.to_le_bytes()),
            FieldValue::Long(v) => write(&mut bytes, &v.to_le_bytes()),
            FieldValue::Byte(v) => bytes[0] = v,
            FieldValue::UShort(v) => write(&mut bytes, &v.to_le_bytes()),
            FieldValue::UInt(v) => write(&mut bytes, &v.to_le_bytes()),
            FieldValue::ULong(v) => write(&mut bytes, &v.to_le_bytes()),
            FieldValue::Vector2(v) => write(&mut bytes, bytemuck::bytes_of(&v.to_array())),
            FieldValue::Vector3(v) => write(&mut bytes, bytemuck::bytes_of(&v.to_array())),
            FieldValue::Vector4(v) => write(&mut bytes, bytemuck::bytes_of(&v.to_array())),
            FieldValue::Color3(v) => write(&mut bytes, bytemuck::bytes_of(&[v.r, v.g, v.b])),
            FieldValue::Color4(v) => write(&mut bytes, bytemuck::bytes_of(&[v.r, v.g, v.b, v.a])),
            FieldValue::Entity(v) => write(&mut bytes, v.0.as_bytes()),
            FieldValue::Asset(v) => write(&mut bytes, &v.0.to_le_bytes()),
        }
        Self { tag, bytes }
    }
}

fn write(dst: &mut [u8; FIELD_BUFFER_CAPACITY], src: &[u8]) {
    dst[..src.len()].copy_from_slice(src);
}

fn read<const N: usize>(src: &[u8; FIELD_BUFFER_CAPACITY]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&src[..N]);
    out
}

fn read_f32s<const N: usize>(src: &[u8; FIELD_BUFFER_CAPACITY]) -> [f32; N] {
    let mut out = [0f32; N];
    for (i, slot) in out.iter_mut().enumerate() {
        let mut word = [0u8; 4];
        word.copy_from_slice(&src[i * 4..i * 4 + 4]);
        *slot = f32::from_le_bytes(word);
    }
    out
}

macro_rules! field_value_conversions {
    ($($variant:ident => $ty:ty),+ $(,)?) => {
        $(
            impl From<$ty> for FieldValue {
                fn from(value: $ty) -> Self {
                    FieldValue::$variant(value)
                }
            }

            impl TryFrom<FieldValue> for $ty {
                type Error = FieldTypeTag;

                /// Fails with the value's actual tag on a type mismatch.
                fn try_from(value: FieldValue) -> Result<Self, FieldTypeTag> {
                    match value {
                        FieldValue::$variant(v) => Ok(v),
                        other => Err(other.tag()),
                    }
                }
            }
        )+
    };
}

field_value_conversions! {
    Float => f32,
    Double => f64,
    Bool => bool,
    Char => char,
    Short => i16,
    Int => i32,
    Long => i64,
    Byte => u8,
    UShort => u16,
    UInt => u32,
    ULong => u64,
    Vector2 => Vec2,
    Vector3 => Vec3,
    Vector4 => Vec4,
    Color3 => Color3,
    Color4 => Color4,
    Entity => EntityRef,
    Asset => AssetHandle,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_values() -> Vec<FieldValue> {
        vec![
            FieldValue::Float(7.5),
            FieldValue::Double(-0.125),
            FieldValue::Bool(true),
            FieldValue::Char('λ'),
            FieldValue::Short(-32_000),
            FieldValue::Int(123_456),
            FieldValue::Long(-9_000_000_000),
            FieldValue::Byte(200),
            FieldValue::UShort(65_000),
            FieldValue::UInt(4_000_000_000),
            FieldValue::ULong(u64::MAX - 7),
            FieldValue::Vector2(Vec2::new(1.0, -2.0)),
            FieldValue::Vector3(Vec3::new(0.5, 1.5, -3.0)),
            FieldValue::Vector4(Vec4::new(0.1, 0.2, 0.3, 0.4)),
            FieldValue::Color3(Color3::new(0.9, 0.1, 0.4)),
            FieldValue::Color4(Color4::new(0.9, 0.1, 0.4, 1.0)),
            FieldValue::Entity(EntityRef(Uuid::new_v4())),
            FieldValue::Asset(AssetHandle(0xDEAD_BEEF)),
        ]
    }

    #[test]
    fn every_tag_fits_the_buffer() {
        for value in sample_values() {
            assert!(
                value.tag().byte_len() <= FIELD_BUFFER_CAPACITY,
                "{} exceeds staging capacity",
                value.tag().label()
            );
        }
    }

    #[test]
    fn buffer_round_trips_every_tag_byte_for_byte() {
        for value in sample_values() {
            let buffer = FieldValueBuffer::from(value);
            assert_eq!(buffer.tag(), value.tag());
            assert_eq!(buffer.bytes().len(), value.tag().byte_len());
            let rebuilt = FieldValueBuffer::from(buffer.decode());
            assert_eq!(rebuilt, buffer, "round trip changed bytes for {}", value.tag().label());
            assert_eq!(buffer.decode(), value);
        }
    }

    #[test]
    fn typed_conversions_reject_mismatched_tags() {
        let value = FieldValue::from(7.5f32);
        assert_eq!(f32::try_from(value), Ok(7.5));
        assert_eq!(i32::try_from(value), Err(FieldTypeTag::Float));
    }
}
