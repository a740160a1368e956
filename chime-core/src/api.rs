use crate::config::{base_url, Config};
use crate::course::CourseSubmission;
use crate::errors::{ChimeError, Result};
use crate::models::{Cart, ChunkReceipt, ChunkUpload, Envelope, Robot, UserDetails};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{multipart, Client, StatusCode};
use url::Url;

/// Status and body of the course-creation request. Anything but 201 is a
/// rejection, so the caller decides; the transport does not.
#[derive(Debug, Clone)]
pub struct CreateResponse {
    pub status: StatusCode,
    pub body: String,
}

/// Admin-side endpoints: chunk assembly and course creation.
#[async_trait]
pub trait CourseApi: Send + Sync {
    async fn send_chunk(&self, chunk: ChunkUpload) -> Result<ChunkReceipt>;

    async fn create_course(&self, submission: &CourseSubmission) -> Result<CreateResponse>;
}

/// User-side endpoints consulted by the page loaders.
#[async_trait]
pub trait AccountApi: Send + Sync {
    async fn user_details(&self, email: &str) -> Result<UserDetails>;

    async fn cart(&self, email: &str) -> Result<Cart>;

    async fn robot(&self, slug: &str) -> Result<Option<Robot>>;
}

/// reqwest-backed client. One instance per process; every endpoint group
/// keeps its own base URL, all share the connection pool and default headers.
#[derive(Clone)]
pub struct ChimeClient {
    client: Client,
    upload_url: Url,
    admin_url: Url,
    user_url: Url,
    cart_url: Url,
    robot_url: Url,
}

impl ChimeClient {
    pub fn new(config: &Config) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .user_agent(concat!("chime/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            upload_url: base_url(&config.upload_base_url)?,
            admin_url: base_url(&config.admin_base_url)?,
            user_url: base_url(&config.user_base_url)?,
            cart_url: base_url(&config.cart_base_url)?,
            robot_url: base_url(&config.robot_base_url)?,
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url, query: &[(&str, &str)]) -> Result<T> {
        let res = self.client.get(url).query(query).send().await?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(ChimeError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        Ok(res.json().await?)
    }
}

#[async_trait]
impl CourseApi for ChimeClient {
    async fn send_chunk(&self, chunk: ChunkUpload) -> Result<ChunkReceipt> {
        let part = multipart::Part::bytes(chunk.data)
            .file_name(chunk.file_name.clone())
            .mime_str(mime::APPLICATION_OCTET_STREAM.as_ref())?;

        let mut form = multipart::Form::new()
            .part("file", part)
            .text("chunkNumber", chunk.chunk_index.to_string())
            .text("totalChunks", chunk.total_chunks.to_string())
            .text("filename", chunk.file_name);

        if let Some(title) = chunk.course_title {
            form = form.text("course_title", title);
        }
        if let Some(upload_type) = chunk.upload_type {
            form = form.text("upload_type", upload_type.as_str());
        }

        let url = self.upload_url.join("upload")?;
        let res = self.client.post(url).multipart(form).send().await?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(ChimeError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        Ok(res.json().await?)
    }

    async fn create_course(&self, submission: &CourseSubmission) -> Result<CreateResponse> {
        let mut form = multipart::Form::new()
            .text("title", submission.title.clone())
            .text("price", submission.price.clone())
            .text("usd", submission.usd.clone())
            .text("description", submission.description.clone())
            .text("author", submission.author.clone())
            .text("category", submission.category.clone())
            .text("type", submission.course_type.clone());

        if let Some(image_name) = &submission.image_name {
            form = form.text("image_name", image_name.clone());
        }
        for name in &submission.course_video_names {
            form = form.text("course_video_names[]", name.clone());
        }
        for name in &submission.quiz_video_names {
            form = form.text("quiz_video_names[]", name.clone());
        }
        for name in &submission.live_session_video_names {
            form = form.text("live_session_video_names[]", name.clone());
        }

        let url = self.admin_url.join(&format!("{}/create", submission.category))?;
        let res = self.client.post(url).multipart(form).send().await?;

        let status = res.status();
        let body = res.text().await?;
        Ok(CreateResponse { status, body })
    }
}

#[async_trait]
impl AccountApi for ChimeClient {
    async fn user_details(&self, email: &str) -> Result<UserDetails> {
        let url = self.user_url.join("details")?;
        self.get_json(url, &[("email", email)]).await
    }

    async fn cart(&self, email: &str) -> Result<Cart> {
        let url = self.cart_url.join("fetch")?;
        let envelope: Envelope<Cart> = self.get_json(url, &[("email", email)]).await?;
        Ok(envelope.data.unwrap_or_default())
    }

    async fn robot(&self, slug: &str) -> Result<Option<Robot>> {
        let url = self.robot_url.join("singleRobot")?;
        let envelope: Envelope<Robot> = self.get_json(url, &[("slug", slug)]).await?;
        Ok(envelope.data)
    }
}
