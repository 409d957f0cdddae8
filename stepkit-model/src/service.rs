use crate::ServiceFault;
use stepkit_types::{EntityRecord, RecordId};

/// Entity store operations a handler may call back into the host for.
///
/// Inside an isolation domain the implementation is a proxy that forwards
/// each call to the host over the domain's channel.
pub trait EntityService {
    /// Creates `record` and returns its new id.
    fn create(&self, record: &EntityRecord) -> Result<RecordId, ServiceFault>;

    /// Reads a record. An empty `columns` slice requests every column.
    fn retrieve(
        &self,
        logical_name: &str,
        id: RecordId,
        columns: &[String],
    ) -> Result<EntityRecord, ServiceFault>;

    fn update(&self, record: &EntityRecord) -> Result<(), ServiceFault>;

    fn delete(&self, logical_name: &str, id: RecordId) -> Result<(), ServiceFault>;
}
