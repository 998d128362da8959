//! Typed, bounded-size copies between native staging buffers and script
//! object fields. The tag on [`FieldValueBuffer`] is authoritative: a buffer
//! whose tag does not match the field's descriptor is rejected instead of
//! reinterpreted.

use anyhow::{bail, Result};

use crate::field::FieldValueBuffer;
use crate::registry::FieldDescriptor;
use crate::runtime::{ObjectHandle, ScriptDomain};

/// Copies a script object's field into a staging buffer sized to its tag.
pub fn get(domain: &ScriptDomain, object: ObjectHandle, field: &FieldDescriptor) -> Result<FieldValueBuffer> {
    if !field.tag().marshals() {
        bail!("field '{}' has an unsupported script type", field.name());
    }
    let value = domain.get_field(object, field.key(), field.tag())?;
    Ok(FieldValueBuffer::from(value))
}

/// Writes a staging buffer into a script object's field.
pub fn set(
    domain: &mut ScriptDomain,
    object: ObjectHandle,
    field: &FieldDescriptor,
    buffer: &FieldValueBuffer,
) -> Result<()> {
    if !field.tag().marshals() {
        bail!("field '{}' has an unsupported script type", field.name());
    }
    if buffer.tag() != field.tag() {
        bail!(
            "field '{}' is {} but the buffer holds {}",
            field.name(),
            field.tag().label(),
            buffer.tag().label()
        );
    }
    domain.set_field(object, field.key(), buffer.decode())
}
