//! Stored records and selection criteria.

use crate::codec;
use crate::entity::{Entity, EntityId};
use crate::error::{StoreError, StoreResult};
use ciborium::Value;
use serde::Serialize;

/// An encoded entity as moved through the unit of work.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    kind: String,
    id: Option<EntityId>,
    payload: Vec<u8>,
}

impl Record {
    /// Creates a record from raw parts.
    pub fn new(kind: impl Into<String>, id: Option<EntityId>, payload: Vec<u8>) -> Self {
        Self {
            kind: kind.into(),
            id,
            payload,
        }
    }

    /// Encodes a typed entity.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Codec`] if the entity cannot be serialized.
    pub fn from_entity<E: Entity>(entity: &E) -> StoreResult<Self> {
        Ok(Self::new(E::KIND, entity.id(), codec::encode(entity)?))
    }

    /// Decodes this record into a typed entity, restoring its ID.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::KindMismatch`] if the record is of another kind,
    /// or [`StoreError::Codec`] if the payload does not decode.
    pub fn decode<E: Entity>(&self) -> StoreResult<E> {
        if self.kind != E::KIND {
            return Err(StoreError::KindMismatch {
                expected: E::KIND.to_string(),
                actual: self.kind.clone(),
            });
        }
        let mut entity: E = codec::decode(&self.payload)?;
        if let Some(id) = self.id {
            entity.set_id(id);
        }
        Ok(entity)
    }

    /// Returns the record kind.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Returns the record ID, or `None` if never saved.
    #[must_use]
    pub fn id(&self) -> Option<EntityId> {
        self.id
    }

    /// Returns the CBOR payload.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub(crate) fn with_id(mut self, id: EntityId) -> Self {
        self.id = Some(id);
        self
    }

    /// Returns the value of a top-level payload field.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Codec`] if the payload does not decode.
    pub fn field(&self, name: &str) -> StoreResult<Option<Value>> {
        match codec::decode::<Value>(&self.payload)? {
            Value::Map(entries) => Ok(entries
                .into_iter()
                .find(|(key, _)| key.as_text() == Some(name))
                .map(|(_, value)| value)),
            _ => Ok(None),
        }
    }
}

/// Selection criteria for loads.
#[derive(Debug, Clone, PartialEq)]
pub enum Criteria {
    /// Every record of the kind.
    All,
    /// The record with this ID.
    Id(EntityId),
    /// Records whose top-level field `name` equals `value`.
    Field {
        /// Field name.
        name: String,
        /// Expected value.
        value: Value,
    },
}

impl Criteria {
    /// Creates a field-equality criterion.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Codec`] if `value` cannot be represented as CBOR.
    pub fn field<T: Serialize + ?Sized>(name: impl Into<String>, value: &T) -> StoreResult<Self> {
        let value = Value::serialized(value).map_err(|e| StoreError::codec(e.to_string()))?;
        Ok(Self::Field {
            name: name.into(),
            value,
        })
    }

    /// Returns true if `record` satisfies these criteria.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Codec`] if a field criterion meets an
    /// undecodable payload.
    pub fn matches(&self, record: &Record) -> StoreResult<bool> {
        match self {
            Self::All => Ok(true),
            Self::Id(id) => Ok(record.id() == Some(*id)),
            Self::Field { name, value } => Ok(record.field(name)?.as_ref() == Some(value)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Note {
        #[serde(skip)]
        id: Option<EntityId>,
        title: String,
    }

    impl Entity for Note {
        const KIND: &'static str = "note";

        fn id(&self) -> Option<EntityId> {
            self.id
        }

        fn set_id(&mut self, id: EntityId) {
            self.id = Some(id);
        }
    }

    fn note(title: &str) -> Note {
        Note {
            id: None,
            title: title.into(),
        }
    }

    #[test]
    fn decode_restores_id() {
        let id = EntityId::new();
        let record = Record::from_entity(&note("a")).unwrap().with_id(id);

        let decoded: Note = record.decode().unwrap();
        assert_eq!(decoded.id, Some(id));
        assert_eq!(decoded.title, "a");
    }

    #[test]
    fn decode_rejects_other_kind() {
        let record = Record::new("user", None, codec::encode(&note("a")).unwrap());
        assert!(matches!(
            record.decode::<Note>(),
            Err(StoreError::KindMismatch { .. })
        ));
    }

    #[test]
    fn field_lookup() {
        let record = Record::from_entity(&note("hello")).unwrap();
        assert_eq!(
            record.field("title").unwrap(),
            Some(Value::Text("hello".into()))
        );
        assert_eq!(record.field("missing").unwrap(), None);
    }

    #[test]
    fn criteria_matching() {
        let id = EntityId::new();
        let record = Record::from_entity(&note("x")).unwrap().with_id(id);

        assert!(Criteria::All.matches(&record).unwrap());
        assert!(Criteria::Id(id).matches(&record).unwrap());
        assert!(!Criteria::Id(EntityId::new()).matches(&record).unwrap());
        assert!(Criteria::field("title", "x").unwrap().matches(&record).unwrap());
        assert!(!Criteria::field("title", "y").unwrap().matches(&record).unwrap());
    }
}
