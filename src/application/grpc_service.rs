// gRPC facade over the optimization service.
//
// Callers identify themselves through the "user-id" request metadata entry;
// every job-scoped RPC is authorized against the submitting user.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status};
use tracing::warn;

use super::mappers::{self, optiq};
use super::service::{OptimizationService, ServiceError};
use crate::domain::job::{CreateJobRequest, Job, JobSubmission};

pub struct GrpcJobService {
    service: Arc<OptimizationService>,
}

impl GrpcJobService {
    pub fn new(service: Arc<OptimizationService>) -> Self {
        Self { service }
    }
}

fn caller_id<T>(request: &Request<T>) -> Result<String, Status> {
    let value = request
        .metadata()
        .get("user-id")
        .ok_or_else(|| Status::unauthenticated("Missing user-id metadata"))?;
    let value = value
        .to_str()
        .map_err(|_| Status::unauthenticated("Invalid user-id metadata"))?;
    if value.is_empty() {
        return Err(Status::unauthenticated("Missing user-id metadata"));
    }
    Ok(value.to_string())
}

fn authorize(job: &Job, caller: &str) -> Result<(), Status> {
    if job.metadata.user_id != caller {
        return Err(Status::permission_denied("Job belongs to another user"));
    }
    Ok(())
}

fn service_error_to_status(err: ServiceError) -> Status {
    match err {
        ServiceError::InvalidModel(_) => Status::invalid_argument(err.to_string()),
        ServiceError::NotFound(_) | ServiceError::SolutionNotReady(_) => {
            Status::not_found(err.to_string())
        }
        ServiceError::NotCancellable { .. } => Status::failed_precondition(err.to_string()),
    }
}

#[tonic::async_trait]
impl optiq::job_service_server::JobService for GrpcJobService {
    async fn submit_job(
        &self,
        request: Request<optiq::SubmitJobRequest>,
    ) -> Result<Response<optiq::Job>, Status> {
        let caller = caller_id(&request)?;
        let message = request.into_inner();

        let model = message
            .model
            .ok_or_else(|| Status::invalid_argument("Model is required"))?;
        let model = mappers::model_from_proto(model).map_err(|e| *e)?;
        let priority = message
            .priority
            .map(mappers::priority_from_proto)
            .transpose()
            .map_err(|e| *e)?;

        let submission = JobSubmission {
            user_id: caller,
            organization_id: message.organization_id,
            tags: message.tags,
            priority,
        };

        let job = self
            .service
            .create_job(CreateJobRequest {
                model,
                metadata: submission,
            })
            .map_err(service_error_to_status)?;

        Ok(Response::new(mappers::job_to_proto(job)))
    }

    async fn get_job(
        &self,
        request: Request<optiq::JobRequest>,
    ) -> Result<Response<optiq::Job>, Status> {
        let caller = caller_id(&request)?;
        let id = mappers::parse_job_id(&request.into_inner().id).map_err(|e| *e)?;

        let job = self.service.get_job(id).map_err(service_error_to_status)?;
        authorize(&job, &caller)?;

        Ok(Response::new(mappers::job_to_proto(job)))
    }

    async fn get_solution(
        &self,
        request: Request<optiq::JobRequest>,
    ) -> Result<Response<optiq::Solution>, Status> {
        let caller = caller_id(&request)?;
        let id = mappers::parse_job_id(&request.into_inner().id).map_err(|e| *e)?;

        let job = self.service.get_job(id).map_err(service_error_to_status)?;
        authorize(&job, &caller)?;

        let solution = job
            .solution
            .ok_or_else(|| Status::not_found(format!("Job {id} has no solution attached")))?;

        Ok(Response::new(mappers::solution_to_proto(solution)))
    }

    async fn list_jobs(
        &self,
        request: Request<optiq::ListJobsRequest>,
    ) -> Result<Response<optiq::JobList>, Status> {
        let caller = caller_id(&request)?;
        let mut filter = mappers::filter_from_proto(request.into_inner()).map_err(|e| *e)?;
        // Callers only ever see their own jobs.
        filter.user_id = Some(caller);

        let (jobs, total) = self.service.list_jobs(&filter);
        Ok(Response::new(optiq::JobList {
            jobs: jobs.into_iter().map(mappers::job_to_proto).collect(),
            total: total as u32,
        }))
    }

    async fn cancel_job(
        &self,
        request: Request<optiq::JobRequest>,
    ) -> Result<Response<optiq::Job>, Status> {
        let caller = caller_id(&request)?;
        let id = mappers::parse_job_id(&request.into_inner().id).map_err(|e| *e)?;

        let job = self.service.get_job(id).map_err(service_error_to_status)?;
        authorize(&job, &caller)?;

        let job = self
            .service
            .cancel_job(id)
            .map_err(service_error_to_status)?;
        Ok(Response::new(mappers::job_to_proto(job)))
    }

    type WatchJobStream = ReceiverStream<Result<optiq::Job, Status>>;

    async fn watch_job(
        &self,
        request: Request<optiq::JobRequest>,
    ) -> Result<Response<Self::WatchJobStream>, Status> {
        let caller = caller_id(&request)?;
        let id = mappers::parse_job_id(&request.into_inner().id).map_err(|e| *e)?;

        let (snapshot, mut events) = self
            .service
            .watch_job(id)
            .map_err(service_error_to_status)?;
        authorize(&snapshot, &caller)?;

        let service = Arc::clone(&self.service);
        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(async move {
            let terminal = snapshot.is_terminal();
            if tx.send(Ok(mappers::job_to_proto(snapshot))).await.is_err() {
                return;
            }
            if terminal {
                return;
            }

            loop {
                match events.recv().await {
                    Ok(job) if job.id == id => {
                        let terminal = job.is_terminal();
                        if tx.send(Ok(mappers::job_to_proto(job))).await.is_err() {
                            return;
                        }
                        if terminal {
                            return;
                        }
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // The terminal snapshot may be among the dropped
                        // events, so resync from the store.
                        warn!(job_id = %id, skipped, "watch stream lagged, resyncing");
                        let Ok(job) = service.get_job(id) else { return };
                        let terminal = job.is_terminal();
                        if tx.send(Ok(mappers::job_to_proto(job))).await.is_err() {
                            return;
                        }
                        if terminal {
                            return;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
        });

        Ok(Response::new(ReceiverStream::new(rx)))
    }

    async fn get_engine_info(
        &self,
        _request: Request<optiq::EngineInfoRequest>,
    ) -> Result<Response<optiq::EngineInfo>, Status> {
        let stats = self.service.stats();
        Ok(Response::new(optiq::EngineInfo {
            backend: stats.backend.to_string(),
            degraded: stats.degraded,
            queued: stats.queued as u32,
            processing: stats.processing as u32,
            stored: stats.stored as u32,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::optiq::job_service_server::JobService;
    use super::*;
    use crate::domain::models::Solution;
    use crate::domain::value_objects::SolutionStatus;
    use crate::solver::FallbackSolver;
    use std::collections::BTreeMap;
    use tokio_stream::StreamExt;

    fn grpc() -> (GrpcJobService, Arc<OptimizationService>) {
        let service = Arc::new(OptimizationService::new(Arc::new(FallbackSolver::new())));
        (GrpcJobService::new(Arc::clone(&service)), service)
    }

    fn authed<T>(inner: T, user: &str) -> Request<T> {
        let mut request = Request::new(inner);
        request
            .metadata_mut()
            .insert("user-id", user.parse().unwrap());
        request
    }

    fn submit_request() -> optiq::SubmitJobRequest {
        optiq::SubmitJobRequest {
            model: Some(optiq::Model {
                name: "production".into(),
                r#type: optiq::model::ProblemType::LinearProgramming as i32,
                variables: vec![optiq::Variable {
                    name: "x1".into(),
                    r#type: optiq::variable::VariableType::Continuous as i32,
                    lower_bound: Some(0.0),
                    upper_bound: Some(40.0),
                    initial_value: None,
                }],
                constraints: vec![optiq::Constraint {
                    name: "c1".into(),
                    expression: "2*x1".into(),
                    sense: optiq::constraint::Sense::Le as i32,
                    rhs: 100.0,
                }],
                objective: Some(optiq::Objective {
                    name: "profit".into(),
                    expression: "3*x1".into(),
                    sense: optiq::objective::Sense::Maximize as i32,
                }),
                config: None,
            }),
            organization_id: None,
            tags: vec!["nightly".into()],
            priority: Some(optiq::job_metadata::Priority::High as i32),
        }
    }

    fn solved() -> Solution {
        let mut values = BTreeMap::new();
        values.insert("x1".to_string(), 40.0);
        Solution::optimal(120.0, values)
    }

    #[tokio::test]
    async fn requests_without_identity_are_unauthenticated() {
        let (grpc, _service) = grpc();
        let err = grpc
            .submit_job(Request::new(submit_request()))
            .await
            .unwrap_err();
        assert_eq!(err.code(), tonic::Code::Unauthenticated);
    }

    #[tokio::test]
    async fn submit_then_get_returns_the_queued_snapshot() {
        let (grpc, _service) = grpc();
        let job = grpc
            .submit_job(authed(submit_request(), "alice"))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(job.status, optiq::JobStatus::Queued as i32);

        let fetched = grpc
            .get_job(authed(optiq::JobRequest { id: job.id.clone() }, "alice"))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(fetched.id, job.id);
        assert_eq!(
            fetched.metadata.unwrap().priority,
            Some(optiq::job_metadata::Priority::High as i32)
        );
    }

    #[tokio::test]
    async fn jobs_are_invisible_across_users() {
        let (grpc, _service) = grpc();
        let job = grpc
            .submit_job(authed(submit_request(), "alice"))
            .await
            .unwrap()
            .into_inner();

        let err = grpc
            .get_job(authed(optiq::JobRequest { id: job.id.clone() }, "bob"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), tonic::Code::PermissionDenied);

        let err = grpc
            .cancel_job(authed(optiq::JobRequest { id: job.id }, "bob"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), tonic::Code::PermissionDenied);
    }

    #[tokio::test]
    async fn malformed_ids_and_unknown_jobs_map_to_grpc_codes() {
        let (grpc, _service) = grpc();

        let err = grpc
            .get_job(authed(
                optiq::JobRequest {
                    id: "not-a-uuid".into(),
                },
                "alice",
            ))
            .await
            .unwrap_err();
        assert_eq!(err.code(), tonic::Code::InvalidArgument);

        let err = grpc
            .get_job(authed(
                optiq::JobRequest {
                    id: crate::domain::job::JobId::new().to_string(),
                },
                "alice",
            ))
            .await
            .unwrap_err();
        assert_eq!(err.code(), tonic::Code::NotFound);
    }

    #[tokio::test]
    async fn solutions_become_available_on_completion() {
        let (grpc, service) = grpc();
        let job = grpc
            .submit_job(authed(submit_request(), "alice"))
            .await
            .unwrap()
            .into_inner();

        let err = grpc
            .get_solution(authed(optiq::JobRequest { id: job.id.clone() }, "alice"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), tonic::Code::NotFound);

        let (claimed, _token) = service.claim_next().unwrap();
        service.finish_job(claimed, Ok(solved()));

        let solution = grpc
            .get_solution(authed(optiq::JobRequest { id: job.id }, "alice"))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(solution.status, optiq::SolutionStatus::Optimal as i32);
        assert_eq!(solution.objective_value, Some(120.0));
        assert_eq!(solution.variables.get("x1"), Some(&40.0));
    }

    #[tokio::test]
    async fn terminal_jobs_cannot_be_cancelled_over_grpc() {
        let (grpc, service) = grpc();
        let job = grpc
            .submit_job(authed(submit_request(), "alice"))
            .await
            .unwrap()
            .into_inner();

        let (claimed, _token) = service.claim_next().unwrap();
        service.finish_job(claimed, Ok(solved()));

        let err = grpc
            .cancel_job(authed(optiq::JobRequest { id: job.id }, "alice"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), tonic::Code::FailedPrecondition);
    }

    #[tokio::test]
    async fn list_jobs_is_scoped_to_the_caller() {
        let (grpc, _service) = grpc();
        grpc.submit_job(authed(submit_request(), "alice"))
            .await
            .unwrap();
        grpc.submit_job(authed(submit_request(), "bob"))
            .await
            .unwrap();

        let list = grpc
            .list_jobs(authed(optiq::ListJobsRequest::default(), "alice"))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(list.total, 1);
        assert_eq!(list.jobs.len(), 1);
        assert_eq!(list.jobs[0].metadata.as_ref().unwrap().user_id, "alice");
    }

    #[tokio::test]
    async fn watch_streams_snapshots_until_terminal() {
        let (grpc, service) = grpc();
        let job = grpc
            .submit_job(authed(submit_request(), "alice"))
            .await
            .unwrap()
            .into_inner();

        let response = grpc
            .watch_job(authed(optiq::JobRequest { id: job.id }, "alice"))
            .await
            .unwrap();
        let mut stream = response.into_inner();

        let queued = stream.next().await.unwrap().unwrap();
        assert_eq!(queued.status, optiq::JobStatus::Queued as i32);

        let (claimed, _token) = service.claim_next().unwrap();
        let running = stream.next().await.unwrap().unwrap();
        assert_eq!(running.status, optiq::JobStatus::Running as i32);

        service.finish_job(claimed, Err(crate::domain::solver_adapter::SolverError::Cancelled));
        let cancelled = stream.next().await.unwrap().unwrap();
        assert_eq!(cancelled.status, optiq::JobStatus::Cancelled as i32);

        // Terminal snapshot closes the stream.
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn engine_info_reports_the_backend() {
        let (grpc, service) = grpc();
        grpc.submit_job(authed(submit_request(), "alice"))
            .await
            .unwrap();

        let info = grpc
            .get_engine_info(Request::new(optiq::EngineInfoRequest {}))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(info.backend, "fallback");
        assert!(info.degraded);
        assert_eq!(info.queued, 1);
        assert_eq!(info.stored, 1);
        assert_eq!(service.stats().queued, 1);

        let error_solution = Solution::new(SolutionStatus::Error, "boom");
        let (claimed, _token) = service.claim_next().unwrap();
        service.finish_job(claimed, Ok(error_solution));

        let info = grpc
            .get_engine_info(Request::new(optiq::EngineInfoRequest {}))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(info.queued, 0);
        assert_eq!(info.processing, 0);
    }
}
