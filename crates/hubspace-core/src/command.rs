// ── Command dispatch ──
//
// Writes one state value to the cloud. The catalog is patched before the
// request goes out so reads are immediately consistent with the user's
// intent; the provider's echo then replaces the optimistic value. Any
// failure rolls the optimistic value back, unless something newer has
// already overwritten it.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, warn};

use hubspace_api::StateRecord;

use crate::error::CoreError;
use crate::model::{StateKey, StateValue};
use crate::store::DeviceCatalog;

#[derive(Clone)]
pub struct CommandDispatcher {
    catalog: Arc<DeviceCatalog>,
}

impl CommandDispatcher {
    pub fn new(catalog: Arc<DeviceCatalog>) -> Self {
        Self { catalog }
    }

    /// Set one state value and return the value the provider confirmed.
    ///
    /// `function_instance: None` addresses the unqualified instance and is
    /// left out of the payload.
    pub async fn set_state(
        &self,
        device_id: &str,
        function_class: &str,
        value: Value,
        function_instance: Option<&str>,
    ) -> Result<Value, CoreError> {
        self.catalog.get(device_id)?;

        let key = StateKey::new(function_class, function_instance);
        let optimistic = StateValue {
            function_class: key.function_class.clone(),
            function_instance: key.function_instance.clone(),
            value,
            last_update_time: Utc::now().timestamp_millis(),
        };

        let previous = self.catalog.patch_state(device_id, &optimistic)?;
        debug!(device_id, key = %key, value = %optimistic.value, "dispatching state change");

        let result = self
            .catalog
            .client()
            .put_state(device_id, vec![StateRecord::from(optimistic.clone())])
            .await;

        let echoed = match result {
            Ok(values) => values
                .into_iter()
                .map(StateValue::from)
                .find(|v| v.matches(&key.function_class, key.function_instance.as_deref())),
            Err(err) => {
                self.roll_back(device_id, &key, &optimistic.value, previous);
                return Err(CoreError::from_command(err));
            }
        };

        let Some(confirmed) = echoed else {
            self.roll_back(device_id, &key, &optimistic.value, previous);
            return Err(CoreError::Command {
                message: format!("response did not echo {key} for {device_id}"),
            });
        };

        if confirmed.value != optimistic.value {
            debug!(
                device_id,
                key = %key,
                requested = %optimistic.value,
                applied = %confirmed.value,
                "provider adjusted requested value"
            );
        }
        let value = confirmed.value.clone();
        // The provider applied the write; a device that left the catalog
        // meanwhile does not make it a failure.
        if let Err(err) = self.catalog.patch_state(device_id, &confirmed) {
            warn!(device_id, key = %key, error = %err, "confirmed value not stored");
        }
        Ok(value)
    }

    fn roll_back(
        &self,
        device_id: &str,
        key: &StateKey,
        optimistic: &Value,
        previous: Option<StateValue>,
    ) {
        if self.catalog.restore_state(device_id, key, optimistic, previous) {
            warn!(device_id, key = %key, "state change failed, optimistic value rolled back");
        } else {
            warn!(device_id, key = %key, "state change failed, value already superseded");
        }
    }
}
