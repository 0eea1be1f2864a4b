//! Field-level encoding of workflow, job and task records.
//!
//! An empty field map means the record does not exist. Missing or
//! malformed fields on an existing record surface as
//! [`StoreError::CorruptRecord`].

use super::{StoreError, StoreResult};
use crate::kv::domain::FieldMap;
use crate::workflow::{
    domain::{Job, LeaseToken, PersistedTaskData, Task, Workflow},
    serializer,
};
use chrono::{DateTime, SecondsFormat, Utc};
use std::str::FromStr;
use tracing::warn;

pub(crate) const ID: &str = "id";
pub(crate) const NAME: &str = "name";
pub(crate) const DESCRIPTOR: &str = "descriptor";
pub(crate) const WORKFLOW: &str = "workflow";
pub(crate) const PAYLOAD: &str = "payload";
pub(crate) const CREATED_AT: &str = "created_at";
pub(crate) const QUEUE_NAME: &str = "queue_name";
pub(crate) const JOB_ID: &str = "job_id";
pub(crate) const PARENT_TASK_ID: &str = "parent_task_id";
pub(crate) const STATUS: &str = "status";
pub(crate) const LOCKED_BY: &str = "locked_by";
pub(crate) const LOCKED_UNTIL: &str = "locked_until";
pub(crate) const WORKFLOW_ID: &str = "workflow_id";
pub(crate) const TASK_ID: &str = "task_id";
pub(crate) const CLAIMED_AT: &str = "claimed_at";

pub(crate) fn workflow_fields(workflow: &Workflow) -> StoreResult<FieldMap> {
    Ok(FieldMap::from([
        (ID.to_owned(), workflow.id().to_string()),
        (NAME.to_owned(), workflow.name().to_owned()),
        (DESCRIPTOR.to_owned(), serializer::encode(workflow.descriptor())?),
    ]))
}

pub(crate) fn decode_workflow(key: &str, fields: &FieldMap) -> StoreResult<Option<Workflow>> {
    if fields.is_empty() {
        return Ok(None);
    }
    let id = parsed(key, ID, required(key, fields, ID)?)?;
    let name = required(key, fields, NAME)?;
    let descriptor = json(key, DESCRIPTOR, required(key, fields, DESCRIPTOR)?)?;
    Ok(Some(Workflow::from_persisted(id, name, descriptor)))
}

pub(crate) fn job_fields(job: &Job) -> StoreResult<FieldMap> {
    Ok(FieldMap::from([
        (ID.to_owned(), job.id().to_string()),
        (WORKFLOW.to_owned(), serializer::encode(job.workflow())?),
        (PAYLOAD.to_owned(), serializer::encode(job.payload())?),
        (CREATED_AT.to_owned(), encode_timestamp(job.created_at())),
    ]))
}

pub(crate) fn decode_job(key: &str, fields: &FieldMap) -> StoreResult<Option<Job>> {
    if fields.is_empty() {
        return Ok(None);
    }
    let id = parsed(key, ID, required(key, fields, ID)?)?;
    let workflow = json(key, WORKFLOW, required(key, fields, WORKFLOW)?)?;
    let payload = json(key, PAYLOAD, required(key, fields, PAYLOAD)?)?;
    let created_at = timestamp(key, CREATED_AT, required(key, fields, CREATED_AT)?)?;
    Ok(Some(Job::from_persisted(id, workflow, payload, created_at)))
}

/// Fields of a freshly materialized task: no status and no lock.
pub(crate) fn new_task_fields(task: &Task) -> StoreResult<FieldMap> {
    Ok(FieldMap::from([
        (ID.to_owned(), task.id().to_string()),
        (NAME.to_owned(), task.name().to_owned()),
        (QUEUE_NAME.to_owned(), task.queue_name().to_owned()),
        (PAYLOAD.to_owned(), serializer::encode(task.payload())?),
        (JOB_ID.to_owned(), task.job_id().to_string()),
        (
            PARENT_TASK_ID.to_owned(),
            task.parent_task_id()
                .map(|id| id.to_string())
                .unwrap_or_default(),
        ),
    ]))
}

pub(crate) fn decode_task(key: &str, fields: &FieldMap) -> StoreResult<Option<Task>> {
    if fields.is_empty() {
        return Ok(None);
    }
    let parent_task_id = non_empty(fields, PARENT_TASK_ID)
        .map(|raw| parsed(key, PARENT_TASK_ID, raw))
        .transpose()?;
    let data = PersistedTaskData {
        id: parsed(key, ID, required(key, fields, ID)?)?,
        name: required(key, fields, NAME)?.to_owned(),
        queue_name: required(key, fields, QUEUE_NAME)?.to_owned(),
        payload: json(key, PAYLOAD, required(key, fields, PAYLOAD)?)?,
        job_id: parsed(key, JOB_ID, required(key, fields, JOB_ID)?)?,
        parent_task_id,
        status: fields.get(STATUS).cloned(),
        locked_by: non_empty(fields, LOCKED_BY).map(LeaseToken::from_raw),
        locked_until: decode_lock_expiry(key, fields)?,
    };
    Ok(Some(Task::from_persisted(data)))
}

/// Returns the stored lease expiry, treating a cleared field as no lease.
pub(crate) fn decode_lock_expiry(key: &str, fields: &FieldMap) -> StoreResult<Option<DateTime<Utc>>> {
    non_empty(fields, LOCKED_UNTIL)
        .map(|raw| timestamp(key, LOCKED_UNTIL, raw))
        .transpose()
}

/// Returns a field value, treating the empty string as absent.
pub(crate) fn non_empty<'a>(fields: &'a FieldMap, field: &str) -> Option<&'a str> {
    fields
        .get(field)
        .map(String::as_str)
        .filter(|value| !value.is_empty())
}

pub(crate) fn encode_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn timestamp(key: &str, field: &str, raw: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|err| corrupt(key, field, &err))
}

pub(crate) fn parsed<T>(key: &str, field: &str, raw: &str) -> StoreResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>().map_err(|err| corrupt(key, field, &err))
}

pub(crate) fn json<T: serde::de::DeserializeOwned>(key: &str, field: &str, raw: &str) -> StoreResult<T> {
    serializer::decode(raw).map_err(|err| corrupt(key, field, &err))
}

/// Returns a field that every record of its kind carries.
pub(crate) fn required<'a>(key: &str, fields: &'a FieldMap, field: &str) -> StoreResult<&'a str> {
    fields
        .get(field)
        .map(String::as_str)
        .ok_or_else(|| corrupt(key, field, &"field is missing"))
}

fn corrupt(key: &str, field: &str, reason: &impl std::fmt::Display) -> StoreError {
    warn!(key = %key, field = %field, reason = %reason, "corrupt stored record");
    StoreError::corrupt(key, format!("{field}: {reason}"))
}

#[cfg(test)]
mod tests {
    use super::{LOCKED_BY, LOCKED_UNTIL, PAYLOAD, decode_task, new_task_fields};
    use crate::workflow::domain::{JobId, NewTask, TaskId};
    use crate::workflow::services::StoreError;
    use serde_json::json;

    fn stored_task_fields() -> crate::kv::domain::FieldMap {
        let task = NewTask::new("fetch", "io", json!({"url": "x"}), JobId::new())
            .into_task(TaskId::new());
        new_task_fields(&task).expect("encode")
    }

    #[test]
    fn new_task_round_trips_without_status_or_lock() {
        let fields = stored_task_fields();
        let task = decode_task("ns:task:k", &fields)
            .expect("decode")
            .expect("record exists");

        assert_eq!(task.status(), None);
        assert_eq!(task.locked_by(), None);
        assert_eq!(task.locked_until(), None);
        assert_eq!(task.parent_task_id(), None);
    }

    #[test]
    fn cleared_lock_fields_decode_as_unlocked() {
        let mut fields = stored_task_fields();
        fields.insert(LOCKED_BY.to_owned(), String::new());
        fields.insert(LOCKED_UNTIL.to_owned(), String::new());

        let task = decode_task("ns:task:k", &fields)
            .expect("decode")
            .expect("record exists");

        assert_eq!(task.locked_by(), None);
        assert_eq!(task.locked_until(), None);
    }

    #[test]
    fn malformed_payload_is_reported_as_corrupt() {
        let mut fields = stored_task_fields();
        fields.insert(PAYLOAD.to_owned(), "{broken".to_owned());

        let result = decode_task("ns:task:k", &fields);

        assert!(matches!(
            result,
            Err(StoreError::CorruptRecord { ref key, .. }) if key == "ns:task:k"
        ));
    }

    #[test]
    fn empty_field_map_is_absent_record() {
        let result = decode_task("ns:task:k", &crate::kv::domain::FieldMap::new());
        assert!(matches!(result, Ok(None)));
    }
}
