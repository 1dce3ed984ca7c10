// SPDX-License-Identifier: MIT

//! Runtime state storage with per-field merge rules

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::schema::StateSchema;
use crate::flow::error::FlowError;

/// State shared by all stages of a run
///
/// Implementations are usually generated with [`shared_state!`](crate::shared_state),
/// which fixes the merge rule of every field at definition time.
pub trait SharedState:
    Clone + Default + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Partial update returned by stages (a subset of fields)
    type Update: Default + Serialize + DeserializeOwned + Send + 'static;

    /// Declared fields and their merge rules
    fn schema() -> StateSchema;

    /// Merge a partial update using each field's merge rule
    fn apply(&mut self, update: Self::Update) -> Result<(), FlowError>;

    /// Deep, independent copy suitable for persistence
    fn snapshot(&self) -> Result<Value, FlowError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Rebuild state from a snapshot
    fn restore(snapshot: Value) -> Result<Self, FlowError> {
        Ok(serde_json::from_value(snapshot)?)
    }

    /// Decode a JSON-shaped partial update, rejecting undeclared fields
    fn decode_update(value: Value) -> Result<Self::Update, FlowError> {
        Self::schema().check_update(&value)?;
        serde_json::from_value(value).map_err(|e| FlowError::schema_mismatch(e.to_string()))
    }
}

/// Field-level merge strategies used by generated `apply` implementations
pub mod merge {
    /// Overwrite the slot when the update carries a value
    pub fn replace<T>(slot: &mut T, value: Option<T>) {
        if let Some(v) = value {
            *slot = v;
        }
    }

    /// Extend the slot with the update's items, keeping existing entries
    pub fn append<T, I>(slot: &mut T, value: Option<T>)
    where
        T: Extend<I> + IntoIterator<Item = I>,
    {
        if let Some(items) = value {
            slot.extend(items);
        }
    }
}

/// Declare a shared state struct, its partial-update companion and the merge
/// rule of every field.
///
/// ```rust,ignore
/// shared_state! {
///     #[derive(PartialEq)]
///     pub struct Notes, update NotesUpdate {
///         title: String => replace,
///         lines: Vec<String> => append,
///     }
/// }
/// ```
#[macro_export]
macro_rules! shared_state {
    (@rule replace) => {
        $crate::flow::state::MergeRule::Replace
    };
    (@rule append) => {
        $crate::flow::state::MergeRule::Append
    };
    (@merge replace, $slot:expr, $value:expr) => {
        $crate::flow::state::merge::replace(&mut $slot, $value)
    };
    (@merge append, $slot:expr, $value:expr) => {
        $crate::flow::state::merge::append(&mut $slot, $value)
    };
    (
        $(#[$meta:meta])*
        $vis:vis struct $state:ident, update $update:ident {
            $(
                $(#[$fmeta:meta])*
                $field:ident : $ty:ty => $rule:ident
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, ::serde::Serialize, ::serde::Deserialize)]
        $vis struct $state {
            $(
                $(#[$fmeta])*
                #[serde(default)]
                pub $field: $ty,
            )*
        }

        /// Partial update: every field is optional
        #[derive(Debug, Clone, Default, ::serde::Serialize, ::serde::Deserialize)]
        #[serde(deny_unknown_fields)]
        $vis struct $update {
            $(
                #[serde(default, skip_serializing_if = "Option::is_none")]
                pub $field: Option<$ty>,
            )*
        }

        impl $crate::flow::state::SharedState for $state {
            type Update = $update;

            fn schema() -> $crate::flow::state::StateSchema {
                $crate::flow::state::StateSchema::new()
                    $(.field(stringify!($field), $crate::shared_state!(@rule $rule)))*
            }

            fn apply(
                &mut self,
                update: Self::Update,
            ) -> Result<(), $crate::flow::error::FlowError> {
                let $update { $($field),* } = update;
                $( $crate::shared_state!(@merge $rule, self.$field, $field); )*
                Ok(())
            }
        }
    };
}
