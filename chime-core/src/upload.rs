use crate::api::CourseApi;
use crate::errors::{ChimeError, Result};
use crate::models::{AssembledFile, ChunkUpload, UploadEvent, UploadFile, UploadStatus, UploadType};
use std::ops::Range;
use std::sync::Arc;
use tokio::sync::mpsc;

/// How a file of `total_size` bytes splits into `chunk_size` pieces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    pub total_size: u64,
    pub chunk_size: u64,
    pub total_chunks: u64,
}

impl ChunkPlan {
    pub fn new(total_size: u64, chunk_size: u64) -> Result<Self> {
        if chunk_size == 0 {
            return Err(ChimeError::ConfigError(
                "chunk size must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            total_size,
            chunk_size,
            total_chunks: total_size.div_ceil(chunk_size),
        })
    }

    pub fn range(&self, chunk_index: u64) -> Range<u64> {
        let start = chunk_index * self.chunk_size;
        let end = std::cmp::min(self.total_size, start + self.chunk_size);
        start..end
    }

    pub fn ranges(&self) -> impl Iterator<Item = (u64, Range<u64>)> + '_ {
        (0..self.total_chunks).map(move |i| (i, self.range(i)))
    }

    pub fn is_last(&self, chunk_index: u64) -> bool {
        chunk_index + 1 == self.total_chunks
    }
}

/// Correlation tags sent with every chunk of a file.
#[derive(Debug, Clone, Default)]
pub struct UploadContext {
    pub course_title: Option<String>,
    pub upload_type: Option<UploadType>,
}

impl UploadContext {
    pub fn new(course_title: impl Into<String>, upload_type: UploadType) -> Self {
        Self {
            course_title: Some(course_title.into()).filter(|t: &String| !t.is_empty()),
            upload_type: Some(upload_type),
        }
    }
}

/// Sends a file to the assembly endpoint one chunk at a time.
///
/// Chunk N+1 is never sent before the response to chunk N has been read,
/// and the first failing chunk ends the job.
#[derive(Clone)]
pub struct ChunkedUploader {
    api: Arc<dyn CourseApi>,
    chunk_size: u64,
}

impl ChunkedUploader {
    pub fn new(api: Arc<dyn CourseApi>, chunk_size: u64) -> Self {
        Self { api, chunk_size }
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub async fn upload(
        &self,
        file: &UploadFile,
        context: &UploadContext,
        sender: &mpsc::Sender<UploadEvent>,
    ) -> Result<AssembledFile> {
        let plan = ChunkPlan::new(file.len(), self.chunk_size)?;

        if file.is_empty() {
            let err = ChimeError::EmptyFile(file.name().to_string());
            let _ = sender
                .send(UploadEvent {
                    status: UploadStatus::Failed {
                        error: err.to_string(),
                    },
                })
                .await;
            return Err(err);
        }

        let file_name = file.name().to_string();

        let _ = sender
            .send(UploadEvent {
                status: UploadStatus::FileStarted {
                    file_name: file_name.clone(),
                    upload_type: context.upload_type,
                    total_size: plan.total_size,
                    total_chunks: plan.total_chunks,
                },
            })
            .await;

        for (chunk_index, range) in plan.ranges() {
            let bytes = range.end - range.start;

            let receipt = match self.send_chunk(file, &plan, chunk_index, range, context).await {
                Ok(receipt) => receipt,
                Err(e) => {
                    log::error!("Error uploading chunk {} of {}: {}", chunk_index, file_name, e);
                    let err = ChimeError::ChunkTransport {
                        file_name: file_name.clone(),
                        chunk_index,
                        total_chunks: plan.total_chunks,
                        source: Box::new(e),
                    };
                    let _ = sender
                        .send(UploadEvent {
                            status: UploadStatus::Failed {
                                error: err.to_string(),
                            },
                        })
                        .await;
                    return Err(err);
                }
            };

            log::debug!(
                "{}: chunk {}/{} accepted ({:?})",
                file_name,
                chunk_index + 1,
                plan.total_chunks,
                receipt.message
            );

            let _ = sender
                .send(UploadEvent {
                    status: UploadStatus::ChunkCompleted {
                        file_name: file_name.clone(),
                        chunk_index,
                        total_chunks: plan.total_chunks,
                        bytes,
                    },
                })
                .await;

            if plan.is_last(chunk_index) && receipt.is_assembled() {
                if let Some(assembled_name) = receipt.file_name {
                    log::info!("{} assembled as {}", file_name, assembled_name);
                    let _ = sender
                        .send(UploadEvent {
                            status: UploadStatus::FileCompleted {
                                file_name: file_name.clone(),
                                assembled_name: assembled_name.clone(),
                            },
                        })
                        .await;
                    return Ok(AssembledFile {
                        file_name: assembled_name,
                    });
                }
            }
        }

        let err = ChimeError::AssemblyIncomplete {
            file_name,
            total_chunks: plan.total_chunks,
        };
        log::error!("{}", err);
        let _ = sender
            .send(UploadEvent {
                status: UploadStatus::Failed {
                    error: err.to_string(),
                },
            })
            .await;
        Err(err)
    }

    async fn send_chunk(
        &self,
        file: &UploadFile,
        plan: &ChunkPlan,
        chunk_index: u64,
        range: Range<u64>,
        context: &UploadContext,
    ) -> Result<crate::models::ChunkReceipt> {
        let data = file.read_chunk(range).await?;
        self.api
            .send_chunk(ChunkUpload {
                file_name: file.name().to_string(),
                chunk_index,
                total_chunks: plan.total_chunks,
                course_title: context.course_title.clone(),
                upload_type: context.upload_type,
                data,
            })
            .await
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{discard_events, FakeCourseApi};
    use super::*;

    fn uploader(api: &Arc<FakeCourseApi>, chunk_size: u64) -> ChunkedUploader {
        ChunkedUploader::new(api.clone(), chunk_size)
    }

    #[test]
    fn plan_partitions_file_exactly() {
        for (len, size) in [(1u64, 4u64), (4, 4), (5, 4), (9, 4), (1_048_576, 1_048_576), (3_000_000, 1_048_576)] {
            let plan = ChunkPlan::new(len, size).unwrap();
            assert_eq!(plan.total_chunks, (len + size - 1) / size);

            let mut next = 0;
            for (i, range) in plan.ranges() {
                assert_eq!(range.start, next, "gap or overlap at chunk {}", i);
                assert!(range.end > range.start);
                assert!(range.end - range.start <= size);
                next = range.end;
            }
            assert_eq!(next, len);
        }
    }

    #[test]
    fn empty_file_plans_zero_chunks() {
        let plan = ChunkPlan::new(0, 1_048_576).unwrap();
        assert_eq!(plan.total_chunks, 0);
        assert_eq!(plan.ranges().count(), 0);
    }

    #[tokio::test]
    async fn uploads_chunks_in_order_and_returns_assembled_name() {
        let api = Arc::new(FakeCourseApi::default());
        let file = UploadFile::from_bytes("lesson.mp4", vec![7u8; 10]);
        let context = UploadContext::new("Algebra 101", UploadType::Course);

        let assembled = uploader(&api, 4).upload(&file, &context, &discard_events()).await.unwrap();

        assert_eq!(assembled.file_name, "stored-lesson.mp4");
        assert_eq!(
            api.sent(),
            vec![
                ("lesson.mp4".to_string(), 0, 3),
                ("lesson.mp4".to_string(), 1, 3),
                ("lesson.mp4".to_string(), 2, 3),
            ]
        );
        let chunks = api.chunks.lock().unwrap();
        assert_eq!(chunks[2].data.len(), 2);
        assert_eq!(chunks[0].course_title.as_deref(), Some("Algebra 101"));
        assert_eq!(chunks[0].upload_type, Some(UploadType::Course));
    }

    #[tokio::test]
    async fn failed_chunk_stops_the_job() {
        let api = Arc::new(FakeCourseApi {
            fail_at: Some(1),
            ..Default::default()
        });
        let file = UploadFile::from_bytes("lesson.mp4", vec![0u8; 16]);

        let err = uploader(&api, 4)
            .upload(&file, &UploadContext::default(), &discard_events())
            .await
            .unwrap_err();

        match err {
            ChimeError::ChunkTransport { chunk_index, total_chunks, .. } => {
                assert_eq!(chunk_index, 1);
                assert_eq!(total_chunks, 4);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(api.sent().len(), 2);
    }

    #[tokio::test]
    async fn missing_assembly_marker_is_an_error() {
        let api = Arc::new(FakeCourseApi {
            withhold_marker: true,
            ..Default::default()
        });
        let file = UploadFile::from_bytes("notes.pdf", vec![1u8; 5]);

        let err = uploader(&api, 4)
            .upload(&file, &UploadContext::default(), &discard_events())
            .await
            .unwrap_err();

        assert!(matches!(err, ChimeError::AssemblyIncomplete { total_chunks: 2, .. }));
    }

    #[test]
    fn zero_chunk_size_is_a_config_error() {
        assert!(matches!(ChunkPlan::new(10, 0), Err(ChimeError::ConfigError(_))));
    }

    #[tokio::test]
    async fn zero_chunk_size_fails_without_requests() {
        let api = Arc::new(FakeCourseApi::default());
        let file = UploadFile::from_bytes("lesson.mp4", vec![0u8; 16]);

        let err = uploader(&api, 0)
            .upload(&file, &UploadContext::default(), &discard_events())
            .await
            .unwrap_err();

        assert!(matches!(err, ChimeError::ConfigError(_)));
        assert!(api.sent().is_empty());
    }

    #[tokio::test]
    async fn assembly_marker_without_file_name_is_an_error() {
        let api = Arc::new(FakeCourseApi {
            omit_file_name: true,
            ..Default::default()
        });
        let file = UploadFile::from_bytes("notes.pdf", vec![1u8; 9]);

        let err = uploader(&api, 4)
            .upload(&file, &UploadContext::default(), &discard_events())
            .await
            .unwrap_err();

        assert!(matches!(err, ChimeError::AssemblyIncomplete { total_chunks: 3, .. }));
        assert_eq!(api.sent().len(), 3);
    }

    #[tokio::test]
    async fn marker_before_last_chunk_is_ignored() {
        let api = Arc::new(FakeCourseApi {
            marker_on_every_chunk: true,
            ..Default::default()
        });
        let file = UploadFile::from_bytes("lesson.mp4", vec![5u8; 12]);

        let assembled = uploader(&api, 4)
            .upload(&file, &UploadContext::default(), &discard_events())
            .await
            .unwrap();

        assert_eq!(assembled.file_name, "stored-lesson.mp4");
        let indices: Vec<u64> = api.sent().into_iter().map(|(_, i, _)| i).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn empty_file_is_rejected_without_requests() {
        let api = Arc::new(FakeCourseApi::default());
        let file = UploadFile::from_bytes("cover.png", Vec::new());

        let err = uploader(&api, 4)
            .upload(&file, &UploadContext::default(), &discard_events())
            .await
            .unwrap_err();

        assert!(matches!(err, ChimeError::EmptyFile(name) if name == "cover.png"));
        assert!(api.sent().is_empty());
    }

    #[tokio::test]
    async fn reports_progress_events() {
        let api = Arc::new(FakeCourseApi::default());
        let file = UploadFile::from_bytes("a.bin", vec![0u8; 8]);
        let (tx, mut rx) = mpsc::channel(16);

        uploader(&api, 4).upload(&file, &UploadContext::default(), &tx).await.unwrap();
        drop(tx);

        let mut statuses = Vec::new();
        while let Some(event) = rx.recv().await {
            statuses.push(event.status);
        }
        assert!(matches!(statuses[0], UploadStatus::FileStarted { total_chunks: 2, .. }));
        assert!(matches!(statuses[1], UploadStatus::ChunkCompleted { chunk_index: 0, .. }));
        assert!(matches!(statuses[2], UploadStatus::ChunkCompleted { chunk_index: 1, .. }));
        assert!(matches!(&statuses[3], UploadStatus::FileCompleted { assembled_name, .. } if assembled_name == "stored-a.bin"));
    }
}
