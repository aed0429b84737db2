//! Repository operations and item mapping

use std::collections::HashMap;

use aws_sdk_dynamodb::types::AttributeValue;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};
use hls_core::{LatestPointer, Preset, VideoRecord, VideoStatus};
use tracing::debug;

use crate::{MetadataError, VideoRepository, LATEST_POINTER_KEY, LISTING_INDEX};

/// One page of the reverse-chronological listing.
#[derive(Debug)]
pub struct VideoPage {
    pub videos: Vec<VideoRecord>,
    pub next_cursor: Option<String>,
}

impl VideoRepository {
    /// Insert a fresh record with status=pending. Fails with
    /// `AlreadyExists` when the id is already present.
    pub async fn create_video(
        &self,
        video_id: &str,
        filename: &str,
        raw_key: &str,
        file_size_bytes: i64,
    ) -> Result<(), MetadataError> {
        let now = format_time(Utc::now());

        self.client()
            .put_item()
            .table_name(self.table())
            .item("videoId", AttributeValue::S(video_id.to_string()))
            .item("recordType", AttributeValue::S("video".to_string()))
            .item("filename", AttributeValue::S(filename.to_string()))
            .item("status", AttributeValue::S(VideoStatus::Pending.as_str().to_string()))
            .item("rawKey", AttributeValue::S(raw_key.to_string()))
            .item("fileSizeBytes", AttributeValue::N(file_size_bytes.to_string()))
            .item("createdAt", AttributeValue::S(now.clone()))
            .item("updatedAt", AttributeValue::S(now))
            .condition_expression("attribute_not_exists(videoId)")
            .send()
            .await
            .map_err(|err| {
                let service_err = err.into_service_error();
                if service_err.is_conditional_check_failed_exception() {
                    MetadataError::AlreadyExists(video_id.to_string())
                } else {
                    MetadataError::Request(service_err.to_string())
                }
            })?;

        debug!(video_id, "created video record");
        Ok(())
    }

    /// Transition to processing. Idempotent: repeating the call leaves the
    /// record in processing. Fails with `NotFound` when the id is absent.
    pub async fn update_video_processing(&self, video_id: &str) -> Result<(), MetadataError> {
        self.update_status(
            video_id,
            VideoStatus::Processing,
            Vec::new(),
            HashMap::new(),
        )
        .await
    }

    /// Transition to completed, record `processedAt`, then rewrite the
    /// latest pointer. The record write lands first so a reader following
    /// the pointer never observes a non-completed record.
    pub async fn complete_video_processing(
        &self,
        video_id: &str,
        playback_url: &str,
        hls_prefix: &str,
        presets: &[Preset],
    ) -> Result<(), MetadataError> {
        let now = Utc::now();
        let preset_names: Vec<AttributeValue> = presets
            .iter()
            .map(|p| AttributeValue::S(p.name.clone()))
            .collect();

        let mut extra_names = Vec::new();
        let mut extra_values = HashMap::new();
        extra_names.push(("processedAt", "#processedAt", ":processedAt"));
        extra_values.insert(
            ":processedAt".to_string(),
            AttributeValue::S(format_time(now)),
        );
        extra_names.push(("hlsPrefix", "#hlsPrefix", ":hlsPrefix"));
        extra_values.insert(
            ":hlsPrefix".to_string(),
            AttributeValue::S(hls_prefix.to_string()),
        );
        extra_names.push(("playbackUrl", "#playbackUrl", ":playbackUrl"));
        extra_values.insert(
            ":playbackUrl".to_string(),
            AttributeValue::S(playback_url.to_string()),
        );
        extra_names.push(("qualityPresets", "#qualityPresets", ":qualityPresets"));
        extra_values.insert(":qualityPresets".to_string(), AttributeValue::L(preset_names));

        self.update_status(video_id, VideoStatus::Completed, extra_names, extra_values)
            .await?;

        self.write_latest_pointer(video_id, playback_url, now).await
    }

    /// Transition to failed with the cause message. Idempotent.
    pub async fn fail_video_processing(
        &self,
        video_id: &str,
        error_message: &str,
    ) -> Result<(), MetadataError> {
        let mut extra_values = HashMap::new();
        extra_values.insert(
            ":errorMessage".to_string(),
            AttributeValue::S(error_message.to_string()),
        );

        self.update_status(
            video_id,
            VideoStatus::Failed,
            vec![("errorMessage", "#errorMessage", ":errorMessage")],
            extra_values,
        )
        .await
    }

    /// Fetch one record by id.
    pub async fn get_video(&self, video_id: &str) -> Result<VideoRecord, MetadataError> {
        let response = self
            .client()
            .get_item()
            .table_name(self.table())
            .key("videoId", AttributeValue::S(video_id.to_string()))
            .send()
            .await
            .map_err(|e| MetadataError::Request(e.to_string()))?;

        let item = response
            .item
            .ok_or_else(|| MetadataError::NotFound(video_id.to_string()))?;
        record_from_item(&item)
    }

    /// Read the latest pointer, then the record it names.
    pub async fn get_latest_video(
        &self,
    ) -> Result<(LatestPointer, VideoRecord), MetadataError> {
        let response = self
            .client()
            .get_item()
            .table_name(self.table())
            .key("videoId", AttributeValue::S(LATEST_POINTER_KEY.to_string()))
            .send()
            .await
            .map_err(|e| MetadataError::Request(e.to_string()))?;

        let item = response
            .item
            .ok_or_else(|| MetadataError::NotFound("latest".to_string()))?;

        let pointer = LatestPointer {
            video_id: string_attr(&item, "latestVideoId")?,
            playback_url: string_attr(&item, "playbackUrl")?,
            processed_at: time_attr(&item, "processedAt")?,
        };

        let record = self.get_video(&pointer.video_id).await?;
        Ok((pointer, record))
    }

    /// Reverse-chronological page over the listing index.
    pub async fn list_videos(
        &self,
        limit: i32,
        cursor: Option<&str>,
    ) -> Result<VideoPage, MetadataError> {
        let mut query = self
            .client()
            .query()
            .table_name(self.table())
            .index_name(LISTING_INDEX)
            .key_condition_expression("#recordType = :recordType")
            .expression_attribute_names("#recordType", "recordType")
            .expression_attribute_values(":recordType", AttributeValue::S("video".to_string()))
            .scan_index_forward(false)
            .limit(limit);

        if let Some(cursor) = cursor {
            query = query.set_exclusive_start_key(Some(decode_cursor(cursor)?));
        }

        let response = query
            .send()
            .await
            .map_err(|e| MetadataError::Request(e.to_string()))?;

        let videos = response
            .items
            .unwrap_or_default()
            .iter()
            .map(record_from_item)
            .collect::<Result<Vec<_>, _>>()?;

        let next_cursor = response.last_evaluated_key.as_ref().map(encode_cursor);

        Ok(VideoPage { videos, next_cursor })
    }

    async fn write_latest_pointer(
        &self,
        video_id: &str,
        playback_url: &str,
        processed_at: DateTime<Utc>,
    ) -> Result<(), MetadataError> {
        self.client()
            .put_item()
            .table_name(self.table())
            .item("videoId", AttributeValue::S(LATEST_POINTER_KEY.to_string()))
            .item("recordType", AttributeValue::S("pointer".to_string()))
            .item("latestVideoId", AttributeValue::S(video_id.to_string()))
            .item("playbackUrl", AttributeValue::S(playback_url.to_string()))
            .item("processedAt", AttributeValue::S(format_time(processed_at)))
            .send()
            .await
            .map_err(|e| MetadataError::Request(e.to_string()))?;

        debug!(video_id, "updated latest pointer");
        Ok(())
    }

    async fn update_status(
        &self,
        video_id: &str,
        status: VideoStatus,
        extra: Vec<(&str, &str, &str)>,
        extra_values: HashMap<String, AttributeValue>,
    ) -> Result<(), MetadataError> {
        let mut expression = String::from("SET #status = :status, #updatedAt = :updatedAt");
        let mut builder = self
            .client()
            .update_item()
            .table_name(self.table())
            .key("videoId", AttributeValue::S(video_id.to_string()))
            .condition_expression("attribute_exists(videoId)")
            .expression_attribute_names("#status", "status")
            .expression_attribute_names("#updatedAt", "updatedAt")
            .expression_attribute_values(
                ":status",
                AttributeValue::S(status.as_str().to_string()),
            )
            .expression_attribute_values(
                ":updatedAt",
                AttributeValue::S(format_time(Utc::now())),
            );

        for (attr, name_ref, value_ref) in &extra {
            expression.push_str(&format!(", {name_ref} = {value_ref}"));
            builder = builder.expression_attribute_names(*name_ref, *attr);
        }
        for (value_ref, value) in extra_values {
            builder = builder.expression_attribute_values(value_ref, value);
        }

        builder
            .update_expression(expression)
            .send()
            .await
            .map_err(|err| {
                let service_err = err.into_service_error();
                if service_err.is_conditional_check_failed_exception() {
                    MetadataError::NotFound(video_id.to_string())
                } else {
                    MetadataError::Request(service_err.to_string())
                }
            })?;

        debug!(video_id, status = status.as_str(), "updated video status");
        Ok(())
    }
}

/// Fixed-width RFC 3339 so `createdAt` sorts lexicographically in the GSI.
fn format_time(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn string_attr(
    item: &HashMap<String, AttributeValue>,
    name: &str,
) -> Result<String, MetadataError> {
    item.get(name)
        .and_then(|v| v.as_s().ok())
        .cloned()
        .ok_or_else(|| MetadataError::Malformed(format!("missing attribute {name}")))
}

fn opt_string_attr(item: &HashMap<String, AttributeValue>, name: &str) -> Option<String> {
    item.get(name).and_then(|v| v.as_s().ok()).cloned()
}

fn time_attr(
    item: &HashMap<String, AttributeValue>,
    name: &str,
) -> Result<DateTime<Utc>, MetadataError> {
    let raw = string_attr(item, name)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| MetadataError::Malformed(format!("bad timestamp in {name}")))
}

fn record_from_item(item: &HashMap<String, AttributeValue>) -> Result<VideoRecord, MetadataError> {
    let status_raw = string_attr(item, "status")?;
    let status = VideoStatus::parse(&status_raw)
        .ok_or_else(|| MetadataError::Malformed(format!("unknown status {status_raw}")))?;

    let file_size_bytes = item
        .get("fileSizeBytes")
        .and_then(|v| v.as_n().ok())
        .and_then(|n| n.parse().ok())
        .unwrap_or(0);

    let quality_presets = item.get("qualityPresets").and_then(|v| v.as_l().ok()).map(|l| {
        l.iter()
            .filter_map(|v| v.as_s().ok().cloned())
            .collect::<Vec<_>>()
    });

    Ok(VideoRecord {
        video_id: string_attr(item, "videoId")?,
        filename: string_attr(item, "filename")?,
        status,
        raw_key: string_attr(item, "rawKey")?,
        hls_prefix: opt_string_attr(item, "hlsPrefix"),
        playback_url: opt_string_attr(item, "playbackUrl"),
        file_size_bytes,
        created_at: time_attr(item, "createdAt")?,
        updated_at: time_attr(item, "updatedAt")?,
        processed_at: opt_string_attr(item, "processedAt")
            .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
            .map(|t| t.with_timezone(&Utc)),
        quality_presets,
        error_message: opt_string_attr(item, "errorMessage"),
    })
}

/// Cursors are the base64 of `videoId\ncreatedAt`, enough to rebuild the
/// GSI's exclusive start key.
fn encode_cursor(key: &HashMap<String, AttributeValue>) -> String {
    let video_id = key
        .get("videoId")
        .and_then(|v| v.as_s().ok())
        .cloned()
        .unwrap_or_default();
    let created_at = key
        .get("createdAt")
        .and_then(|v| v.as_s().ok())
        .cloned()
        .unwrap_or_default();
    URL_SAFE_NO_PAD.encode(format!("{video_id}\n{created_at}"))
}

fn decode_cursor(cursor: &str) -> Result<HashMap<String, AttributeValue>, MetadataError> {
    let raw = URL_SAFE_NO_PAD
        .decode(cursor)
        .map_err(|_| MetadataError::InvalidCursor)?;
    let text = String::from_utf8(raw).map_err(|_| MetadataError::InvalidCursor)?;
    let (video_id, created_at) = text.split_once('\n').ok_or(MetadataError::InvalidCursor)?;
    if video_id.is_empty() || created_at.is_empty() {
        return Err(MetadataError::InvalidCursor);
    }

    let mut key = HashMap::new();
    key.insert(
        "videoId".to_string(),
        AttributeValue::S(video_id.to_string()),
    );
    key.insert(
        "recordType".to_string(),
        AttributeValue::S("video".to_string()),
    );
    key.insert(
        "createdAt".to_string(),
        AttributeValue::S(created_at.to_string()),
    );
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_round_trip() {
        let mut key = HashMap::new();
        key.insert(
            "videoId".to_string(),
            AttributeValue::S("abc-123".to_string()),
        );
        key.insert(
            "createdAt".to_string(),
            AttributeValue::S("2026-01-02T03:04:05.000006Z".to_string()),
        );

        let cursor = encode_cursor(&key);
        let decoded = decode_cursor(&cursor).unwrap();
        assert_eq!(
            decoded.get("videoId").unwrap().as_s().unwrap(),
            "abc-123"
        );
        assert_eq!(
            decoded.get("createdAt").unwrap().as_s().unwrap(),
            "2026-01-02T03:04:05.000006Z"
        );
        assert_eq!(decoded.get("recordType").unwrap().as_s().unwrap(), "video");
    }

    #[test]
    fn test_cursor_rejects_garbage() {
        assert!(decode_cursor("!!!not-base64!!!").is_err());
        assert!(decode_cursor(&URL_SAFE_NO_PAD.encode("no-separator")).is_err());
        assert!(decode_cursor(&URL_SAFE_NO_PAD.encode("\n2026-01-01T00:00:00Z")).is_err());
    }

    #[test]
    fn test_format_time_fixed_width_sorts() {
        let earlier = Utc::now();
        let later = earlier + chrono::Duration::microseconds(1);
        assert!(format_time(earlier) < format_time(later));
        assert_eq!(format_time(earlier).len(), format_time(later).len());
    }

    #[test]
    fn test_record_from_item_minimal() {
        let mut item = HashMap::new();
        item.insert("videoId".to_string(), AttributeValue::S("v1".to_string()));
        item.insert("filename".to_string(), AttributeValue::S("a.mp4".to_string()));
        item.insert("status".to_string(), AttributeValue::S("pending".to_string()));
        item.insert(
            "rawKey".to_string(),
            AttributeValue::S("uploads/v1.mp4".to_string()),
        );
        item.insert(
            "fileSizeBytes".to_string(),
            AttributeValue::N("1024".to_string()),
        );
        item.insert(
            "createdAt".to_string(),
            AttributeValue::S("2026-01-02T03:04:05.000006Z".to_string()),
        );
        item.insert(
            "updatedAt".to_string(),
            AttributeValue::S("2026-01-02T03:04:05.000006Z".to_string()),
        );

        let record = record_from_item(&item).unwrap();
        assert_eq!(record.video_id, "v1");
        assert_eq!(record.status, hls_core::VideoStatus::Pending);
        assert_eq!(record.file_size_bytes, 1024);
        assert!(record.hls_prefix.is_none());
        assert!(record.processed_at.is_none());
    }

    #[test]
    fn test_record_from_item_rejects_unknown_status() {
        let mut item = HashMap::new();
        item.insert("videoId".to_string(), AttributeValue::S("v1".to_string()));
        item.insert("filename".to_string(), AttributeValue::S("a.mp4".to_string()));
        item.insert("status".to_string(), AttributeValue::S("queued".to_string()));
        item.insert("rawKey".to_string(), AttributeValue::S("k".to_string()));
        item.insert(
            "createdAt".to_string(),
            AttributeValue::S("2026-01-02T03:04:05Z".to_string()),
        );
        item.insert(
            "updatedAt".to_string(),
            AttributeValue::S("2026-01-02T03:04:05Z".to_string()),
        );

        assert!(matches!(
            record_from_item(&item),
            Err(MetadataError::Malformed(_))
        ));
    }
}
