use crosspost_common::{
    model::{ModelValidationError, id::RecordId, post::PostRecord},
    schedule,
};
use time::{PrimitiveDateTime, UtcDateTime};
use tracing::warn;

#[derive(Clone, Eq, PartialEq, Debug, Hash, sqlx::FromRow)]
pub(crate) struct PostRow {
    pub record_id: String,
    pub content: String,
    pub platform: String,
    pub images: Vec<String>,
    pub scheduled_at: Option<String>,
    pub status: String,
    pub created_at: PrimitiveDateTime,
    pub updated_at: PrimitiveDateTime,
}

pub(crate) fn to_primitive(instant: UtcDateTime) -> PrimitiveDateTime {
    PrimitiveDateTime::new(instant.date(), instant.time())
}

impl From<&PostRecord> for PostRow {
    fn from(value: &PostRecord) -> Self {
        Self {
            record_id: value.id.get().to_owned(),
            content: value.content.clone(),
            platform: value.platform.id().to_owned(),
            images: value.images.clone(),
            scheduled_at: value.scheduled_at.map(schedule::format_stored),
            status: value.status.as_str().to_owned(),
            created_at: to_primitive(value.created_at),
            updated_at: to_primitive(value.updated_at),
        }
    }
}

impl TryFrom<PostRow> for PostRecord {
    type Error = ModelValidationError;

    fn try_from(value: PostRow) -> Result<Self, Self::Error> {
        let scheduled_at = value
            .scheduled_at
            .filter(|literal| !literal.trim().is_empty())
            .map(|literal| {
                schedule::parse_stored(&literal)
                    .ok_or(ModelValidationError::InvalidSchedule(literal))
            })
            .transpose()?;

        Ok(Self {
            id: RecordId::from_raw(value.record_id),
            content: value.content,
            platform: value.platform.parse()?,
            images: value.images,
            scheduled_at,
            status: value.status.parse()?,
            created_at: value.created_at.as_utc(),
            updated_at: value.updated_at.as_utc(),
        })
    }
}

/// Converts fetched rows, dropping the ones that do not map to the model.
///
/// The dispatch automation writes to the same table.
pub(crate) fn rows_to_records(rows: Vec<PostRow>) -> Vec<PostRecord> {
    rows.into_iter()
        .filter_map(|row| {
            let record_id = row.record_id.clone();
            PostRecord::try_from(row)
                .inspect_err(|err| {
                    warn!(%record_id, error = %err, "Skipping unreadable post row");
                })
                .ok()
        })
        .collect()
}
