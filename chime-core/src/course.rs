use crate::api::CourseApi;
use crate::errors::{ChimeError, Result};
use crate::models::{SubmissionPhase, UploadEvent, UploadFile, UploadStatus, UploadType};
use crate::upload::{ChunkedUploader, UploadContext};
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

pub const DEFAULT_CATEGORY: &str = "courses";

/// Everything the admin enters on the "create course" form.
#[derive(Debug, Clone)]
pub struct CourseForm {
    pub title: String,
    pub price: String,
    pub usd: String,
    pub description: String,
    /// Taken from the admin session; survives a reset.
    pub author: String,
    pub category: String,
    pub course_type: String,
    pub image: Option<UploadFile>,
    pub videos: Vec<UploadFile>,
    pub quizzes: Vec<UploadFile>,
    pub live_sessions: Vec<UploadFile>,
}

impl CourseForm {
    pub fn new(author: impl Into<String>) -> Self {
        Self {
            title: String::new(),
            price: String::new(),
            usd: String::new(),
            description: String::new(),
            author: author.into(),
            category: DEFAULT_CATEGORY.to_string(),
            course_type: String::new(),
            image: None,
            videos: Vec::new(),
            quizzes: Vec::new(),
            live_sessions: Vec::new(),
        }
    }

    /// Clear every field the admin typed or selected.
    pub fn reset(&mut self) {
        self.title.clear();
        self.price.clear();
        self.usd.clear();
        self.description.clear();
        self.category.clear();
        self.course_type.clear();
        self.image = None;
        self.videos.clear();
        self.quizzes.clear();
        self.live_sessions.clear();
    }

    fn file_groups(&self) -> [(UploadType, &[UploadFile]); 3] {
        [
            (UploadType::Course, self.videos.as_slice()),
            (UploadType::Quiz, self.quizzes.as_slice()),
            (UploadType::LiveSession, self.live_sessions.as_slice()),
        ]
    }
}

/// Name a video is uploaded under: the course title, an underscore, then
/// the original name. Nothing is slugified.
pub fn titled_file_name(title: &str, file_name: &str) -> String {
    format!("{}_{}", title, file_name)
}

/// Payload of the category-scoped creation request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CourseSubmission {
    pub title: String,
    pub price: String,
    pub usd: String,
    pub description: String,
    pub author: String,
    pub category: String,
    #[serde(rename = "type")]
    pub course_type: String,
    pub image_name: Option<String>,
    pub course_video_names: Vec<String>,
    pub quiz_video_names: Vec<String>,
    pub live_session_video_names: Vec<String>,
}

impl CourseSubmission {
    fn names_mut(&mut self, upload_type: UploadType) -> &mut Vec<String> {
        match upload_type {
            UploadType::Quiz => &mut self.quiz_video_names,
            UploadType::LiveSession => &mut self.live_session_video_names,
            UploadType::Course | UploadType::Image => &mut self.course_video_names,
        }
    }

    pub fn file_count(&self) -> usize {
        self.image_name.iter().count()
            + self.course_video_names.len()
            + self.quiz_video_names.len()
            + self.live_session_video_names.len()
    }
}

#[derive(Debug, Clone)]
pub struct CreatedCourse {
    pub submission: CourseSubmission,
    pub created_at: DateTime<Utc>,
}

/// Drives one "create course" action: every upload in order, then a
/// single creation request.
#[derive(Clone)]
pub struct CourseCreator {
    api: Arc<dyn CourseApi>,
    uploader: ChunkedUploader,
}

impl CourseCreator {
    pub fn new(api: Arc<dyn CourseApi>, chunk_size: u64) -> Self {
        Self {
            uploader: ChunkedUploader::new(api.clone(), chunk_size),
            api,
        }
    }

    pub fn uploader(&self) -> &ChunkedUploader {
        &self.uploader
    }

    /// Run the whole submission. On 201 the form is reset; on any failure
    /// it is left exactly as entered so the admin can retry.
    pub async fn submit(&self, form: &mut CourseForm, sender: &mpsc::Sender<UploadEvent>) -> Result<CreatedCourse> {
        let mut phase = SubmissionPhase::Idle;

        if form.category.trim().is_empty() {
            let err = ChimeError::InvalidForm("category is required".to_string());
            let _ = sender
                .send(UploadEvent {
                    status: UploadStatus::Failed { error: err.to_string() },
                })
                .await;
            return Err(err);
        }

        advance(&mut phase, SubmissionPhase::Uploading, sender).await;
        let submission = match self.upload_files(form, sender).await {
            Ok(submission) => submission,
            Err(e) => {
                log::error!("Course upload aborted: {}", e);
                advance(&mut phase, SubmissionPhase::Failed, sender).await;
                return Err(e);
            }
        };

        advance(&mut phase, SubmissionPhase::Submitting, sender).await;
        let outcome = match self.api.create_course(&submission).await {
            Ok(res) if res.status == StatusCode::CREATED => Ok(()),
            Ok(res) => Err(ChimeError::SubmissionRejected {
                status: res.status.as_u16(),
                body: res.body,
            }),
            Err(e) => Err(e),
        };

        if let Err(e) = outcome {
            log::error!("Error: {}", e);
            let _ = sender
                .send(UploadEvent {
                    status: UploadStatus::Failed { error: e.to_string() },
                })
                .await;
            advance(&mut phase, SubmissionPhase::Failed, sender).await;
            return Err(e);
        }

        log::info!(
            "Course '{}' created in {} with {} file(s)",
            submission.title,
            submission.category,
            submission.file_count()
        );
        let _ = sender
            .send(UploadEvent {
                status: UploadStatus::Created {
                    title: submission.title.clone(),
                },
            })
            .await;
        advance(&mut phase, SubmissionPhase::Succeeded, sender).await;
        form.reset();

        Ok(CreatedCourse {
            submission,
            created_at: Utc::now(),
        })
    }

    /// Upload the image, then each video group in turn. The first failure
    /// returns immediately; nothing after it is uploaded.
    async fn upload_files(&self, form: &CourseForm, sender: &mpsc::Sender<UploadEvent>) -> Result<CourseSubmission> {
        let mut submission = CourseSubmission {
            title: form.title.clone(),
            price: form.price.clone(),
            usd: form.usd.clone(),
            description: form.description.clone(),
            author: form.author.clone(),
            category: form.category.clone(),
            course_type: form.course_type.clone(),
            ..Default::default()
        };

        if let Some(image) = &form.image {
            let context = UploadContext::new(form.title.clone(), UploadType::Image);
            let assembled = self.uploader.upload(image, &context, sender).await?;
            submission.image_name = Some(assembled.file_name);
        }

        for (upload_type, files) in form.file_groups() {
            for file in files {
                let renamed = file.renamed(titled_file_name(&form.title, file.name()));
                let context = UploadContext::new(form.title.clone(), upload_type);
                let assembled = self.uploader.upload(&renamed, &context, sender).await?;
                submission.names_mut(upload_type).push(assembled.file_name);
            }
        }

        Ok(submission)
    }
}

async fn advance(phase: &mut SubmissionPhase, next: SubmissionPhase, sender: &mpsc::Sender<UploadEvent>) {
    debug_assert!(phase.can_advance_to(next), "{:?} -> {:?}", phase, next);
    log::debug!("submission {:?} -> {:?}", phase, next);
    *phase = next;
    let _ = sender
        .send(UploadEvent {
            status: UploadStatus::Phase(next),
        })
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::testing::{discard_events, FakeCourseApi};

    fn creator(api: &Arc<FakeCourseApi>) -> CourseCreator {
        CourseCreator::new(api.clone(), 4)
    }

    fn filled_form() -> CourseForm {
        let mut form = CourseForm::new("Okeke");
        form.title = "Algebra 101".into();
        form.price = "5000".into();
        form.usd = "5".into();
        form.description = "Linear equations".into();
        form.course_type = "video".into();
        form.image = Some(UploadFile::from_bytes("cover.png", vec![1u8; 6]));
        form.videos = vec![
            UploadFile::from_bytes("intro.mp4", vec![2u8; 9]),
            UploadFile::from_bytes("lesson.mp4", vec![3u8; 3]),
        ];
        form.quizzes = vec![UploadFile::from_bytes("quiz1.mp4", vec![4u8; 4])];
        form
    }

    #[test]
    fn title_prefix_is_kept_verbatim() {
        assert_eq!(titled_file_name("Algebra 101", "intro.mp4"), "Algebra 101_intro.mp4");
    }

    #[test]
    fn new_form_defaults_to_courses_category() {
        let form = CourseForm::new("Okeke");
        assert_eq!(form.category, "courses");
        assert_eq!(form.author, "Okeke");
    }

    #[tokio::test]
    async fn uploads_sequentially_then_submits_names_in_input_order() {
        let api = Arc::new(FakeCourseApi::default());
        let mut form = filled_form();

        let created = creator(&api).submit(&mut form, &discard_events()).await.unwrap();

        let files: Vec<String> = api.sent().into_iter().map(|(name, _, _)| name).collect();
        assert_eq!(
            files,
            vec![
                "cover.png",
                "cover.png",
                "Algebra 101_intro.mp4",
                "Algebra 101_intro.mp4",
                "Algebra 101_intro.mp4",
                "Algebra 101_lesson.mp4",
                "Algebra 101_quiz1.mp4",
            ]
        );

        let chunks = api.chunks.lock().unwrap();
        assert_eq!(chunks[0].upload_type, Some(UploadType::Image));
        assert_eq!(chunks[6].upload_type, Some(UploadType::Quiz));
        drop(chunks);

        let submissions = api.submissions.lock().unwrap();
        assert_eq!(submissions.len(), 1);
        let sent = &submissions[0];
        assert_eq!(sent.image_name.as_deref(), Some("stored-cover.png"));
        assert_eq!(
            sent.course_video_names,
            vec!["stored-Algebra 101_intro.mp4", "stored-Algebra 101_lesson.mp4"]
        );
        assert_eq!(sent.quiz_video_names, vec!["stored-Algebra 101_quiz1.mp4"]);
        assert!(sent.live_session_video_names.is_empty());
        assert_eq!(sent.author, "Okeke");
        assert_eq!(created.submission, *sent);
    }

    #[tokio::test]
    async fn created_response_resets_form() {
        let api = Arc::new(FakeCourseApi::default());
        let mut form = filled_form();

        creator(&api).submit(&mut form, &discard_events()).await.unwrap();

        assert!(form.title.is_empty());
        assert!(form.price.is_empty());
        assert!(form.usd.is_empty());
        assert!(form.description.is_empty());
        assert!(form.category.is_empty());
        assert!(form.course_type.is_empty());
        assert!(form.image.is_none());
        assert!(form.videos.is_empty());
        assert!(form.quizzes.is_empty());
        assert!(form.live_sessions.is_empty());
        assert_eq!(form.author, "Okeke");
    }

    #[tokio::test]
    async fn rejected_submission_keeps_form() {
        let api = Arc::new(FakeCourseApi {
            create_status: StatusCode::OK,
            ..Default::default()
        });
        let mut form = filled_form();

        let err = creator(&api).submit(&mut form, &discard_events()).await.unwrap_err();

        assert!(matches!(err, ChimeError::SubmissionRejected { status: 200, .. }));
        assert_eq!(form.title, "Algebra 101");
        assert_eq!(form.category, "courses");
        assert_eq!(form.videos.len(), 2);
        assert!(form.image.is_some());
    }

    #[tokio::test]
    async fn transport_error_on_create_keeps_form() {
        let api = Arc::new(FakeCourseApi {
            create_fails: true,
            ..Default::default()
        });
        let mut form = filled_form();

        let err = creator(&api).submit(&mut form, &discard_events()).await.unwrap_err();

        assert!(matches!(err, ChimeError::IoError(_)));
        assert_eq!(api.submissions.lock().unwrap().len(), 1);
        assert_eq!(form.title, "Algebra 101");
        assert_eq!(form.price, "5000");
        assert_eq!(form.usd, "5");
        assert_eq!(form.description, "Linear equations");
        assert_eq!(form.category, "courses");
        assert_eq!(form.course_type, "video");
        assert!(form.image.is_some());
        assert_eq!(form.videos.len(), 2);
        assert_eq!(form.quizzes.len(), 1);
    }

    #[tokio::test]
    async fn zero_chunk_size_fails_instead_of_panicking() {
        let api = Arc::new(FakeCourseApi::default());
        let mut form = filled_form();

        let err = CourseCreator::new(api.clone(), 0)
            .submit(&mut form, &discard_events())
            .await
            .unwrap_err();

        assert!(matches!(err, ChimeError::ConfigError(_)));
        assert!(api.sent().is_empty());
        assert!(api.submissions.lock().unwrap().is_empty());
        assert_eq!(form.title, "Algebra 101");
    }

    #[tokio::test]
    async fn failed_chunk_skips_remaining_uploads_and_submission() {
        // Third request is the first chunk of the first video.
        let api = Arc::new(FakeCourseApi {
            fail_at: Some(2),
            ..Default::default()
        });
        let mut form = filled_form();

        let err = creator(&api).submit(&mut form, &discard_events()).await.unwrap_err();

        assert!(matches!(err, ChimeError::ChunkTransport { chunk_index: 0, .. }));
        assert_eq!(api.sent().len(), 3);
        assert!(api.submissions.lock().unwrap().is_empty());
        assert_eq!(form.title, "Algebra 101");
    }

    #[tokio::test]
    async fn empty_image_blocks_submission() {
        let api = Arc::new(FakeCourseApi::default());
        let mut form = filled_form();
        form.image = Some(UploadFile::from_bytes("cover.png", Vec::new()));

        let err = creator(&api).submit(&mut form, &discard_events()).await.unwrap_err();

        assert!(matches!(err, ChimeError::EmptyFile(_)));
        assert!(api.sent().is_empty());
        assert!(api.submissions.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn form_without_files_submits_scalars_only() {
        let api = Arc::new(FakeCourseApi::default());
        let mut form = CourseForm::new("Okeke");
        form.title = "Theory".into();

        let created = creator(&api).submit(&mut form, &discard_events()).await.unwrap();

        assert!(api.sent().is_empty());
        assert_eq!(created.submission.file_count(), 0);
        assert_eq!(created.submission.category, "courses");
    }

    #[tokio::test]
    async fn phases_follow_the_state_machine() {
        let api = Arc::new(FakeCourseApi {
            fail_at: Some(0),
            ..Default::default()
        });
        let mut form = filled_form();
        let (tx, mut rx) = mpsc::channel(64);

        let _ = creator(&api).submit(&mut form, &tx).await;
        drop(tx);

        let mut phases = Vec::new();
        while let Some(event) = rx.recv().await {
            if let UploadStatus::Phase(phase) = event.status {
                phases.push(phase);
            }
        }
        assert_eq!(phases, vec![SubmissionPhase::Uploading, SubmissionPhase::Failed]);
    }
}
