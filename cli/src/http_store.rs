//! Board and tile store over the server's REST routes.
//!
//! Error bodies are `{code, message, retryable}`. Status codes map back onto
//! [`StoreError`]: 404 is `NotFound`, 409 is `Conflict`, 400 is
//! `InvalidSnapshot`, and anything else (including transport failures) is
//! `Unavailable`.

use async_trait::async_trait;
use canvas::grid::BoardId;
use canvas::store::{BoardRow, BoardStore, PixelImage, PixelOwner, StoreError, TileStore};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

#[derive(Debug, Clone)]
pub struct HttpBoardStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBoardStore {
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self { client, base_url: base_url.trim_end_matches('/').to_owned() }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send_json(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        board_id: BoardId,
        expected: Option<i64>,
    ) -> Result<Value, StoreError> {
        let mut request = self.client.request(method, self.url(path));
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await.map_err(transport)?;
        read_body(response, board_id, expected).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, board_id: BoardId) -> Result<T, StoreError> {
        let value = self.send_json(Method::GET, path, None, board_id, None).await?;
        serde_json::from_value(value).map_err(|e| StoreError::InvalidSnapshot(format!("{path}: {e}")))
    }
}

fn transport(err: reqwest::Error) -> StoreError {
    StoreError::Unavailable(err.to_string())
}

async fn read_body(response: reqwest::Response, board_id: BoardId, expected: Option<i64>) -> Result<Value, StoreError> {
    let status = response.status();
    let body = response.json::<Value>().await.unwrap_or(Value::Null);
    if status.is_success() {
        Ok(body)
    } else {
        Err(status_error(status, board_id, expected, &body))
    }
}

/// Translate a failed response into the store error it stands for.
pub(crate) fn status_error(status: StatusCode, board_id: BoardId, expected: Option<i64>, body: &Value) -> StoreError {
    let message = body
        .get("message")
        .and_then(Value::as_str)
        .map_or_else(|| body.to_string(), ToOwned::to_owned);
    match status {
        StatusCode::NOT_FOUND => StoreError::NotFound(board_id),
        StatusCode::CONFLICT => StoreError::Conflict {
            expected: expected.unwrap_or(0),
            actual: body.get("actual_version").and_then(Value::as_i64).unwrap_or(0),
        },
        StatusCode::BAD_REQUEST => StoreError::InvalidSnapshot(message),
        _ => StoreError::Unavailable(format!("HTTP {}: {message}", status.as_u16())),
    }
}

#[async_trait]
impl BoardStore for HttpBoardStore {
    async fn load_board(&self, board_id: BoardId) -> Result<BoardRow, StoreError> {
        self.get(&format!("/api/boards/{board_id}"), board_id).await
    }

    async fn upsert_board(&self, row: &BoardRow, expected_version: Option<i64>) -> Result<i64, StoreError> {
        let body = json!({
            "size": row.size,
            "data": row.data,
            "owners_json": row.owners_json,
            "images_json": row.images_json,
            "expected_version": expected_version,
        });
        let reply = self
            .send_json(Method::PUT, &format!("/api/boards/{}", row.id), Some(body), row.id, expected_version)
            .await?;
        reply
            .get("version")
            .and_then(Value::as_i64)
            .ok_or_else(|| StoreError::Unavailable("board write reply has no version".into()))
    }

    async fn upsert_pixel_owner(&self, owner: &PixelOwner) -> Result<(), StoreError> {
        let path = format!("/api/boards/{}/pixels/{}", owner.board_id, owner.idx);
        let body = json!({ "owner": owner.owner, "color_idx": owner.color_idx });
        self.send_json(Method::PUT, &path, Some(body), owner.board_id, None).await?;
        Ok(())
    }

    async fn upsert_pixel_image(&self, image: &PixelImage) -> Result<(), StoreError> {
        let path = format!("/api/boards/{}/images/{}", image.board_id, image.idx);
        let body = json!({ "path": image.path, "owner": image.owner });
        self.send_json(Method::PUT, &path, Some(body), image.board_id, None).await?;
        Ok(())
    }

    async fn list_pixel_owners(&self, board_id: BoardId) -> Result<Vec<PixelOwner>, StoreError> {
        self.get(&format!("/api/boards/{board_id}/pixels"), board_id).await
    }

    async fn pixel_owner(&self, board_id: BoardId, idx: u32) -> Result<Option<PixelOwner>, StoreError> {
        match self.get(&format!("/api/boards/{board_id}/pixels/{idx}"), board_id).await {
            Ok(record) => Ok(Some(record)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl TileStore for HttpBoardStore {
    async fn put_tile(&self, board_id: BoardId, idx: u32, png: Vec<u8>) -> Result<String, StoreError> {
        let response = self
            .client
            .post(self.url(&format!("/api/tiles/{board_id}/{idx}")))
            .header(reqwest::header::CONTENT_TYPE, "image/png")
            .body(png)
            .send()
            .await
            .map_err(transport)?;
        let reply = read_body(response, board_id, None).await?;
        reply
            .get("url")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned)
            .ok_or_else(|| StoreError::Unavailable("tile upload reply has no url".into()))
    }
}

#[cfg(test)]
#[path = "http_store_test.rs"]
mod tests;
