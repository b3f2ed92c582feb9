use crate::core::Value;
use crate::field::FieldInstance;

/// Live values of one property inside a payload.
///
/// Own field slots are writable through the owning object; external values
/// are read-only copies of the joined columns, in bucket order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyInstance {
    pub(crate) fields: Vec<FieldInstance>,
    pub(crate) external: Vec<Value>,
}

impl PropertyInstance {
    pub fn fields(&self) -> &[FieldInstance] {
        &self.fields
    }

    pub fn field(&self, index: usize) -> Option<&FieldInstance> {
        self.fields.get(index)
    }

    pub fn external_values(&self) -> &[Value] {
        &self.external
    }
}
