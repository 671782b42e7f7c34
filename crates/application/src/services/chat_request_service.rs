//! 聊天请求审核流服务
//!
//! 编排三方审核流水线：请求创建、管理员接手审核、审核完成或
//! 拒绝，以及遗留的目标用户答复路径。状态迁移采用读取、实体
//! 校验、条件更新三步，条件更新失败即报告并发冲突。

use crate::clock::Clock;
use crate::directory::{PetDirectory, UserDirectory};
use crate::errors::{ApplicationError, ApplicationResult};
use crate::notification::{notify_quietly, NotificationEmitter};
use crate::notifier::{publish_quietly, EventScope, RealtimeNotifier};
use crate::services::room_service::RoomService;
use domain::entities::{ChatRequest, ChatRequestStatus, RequestId, RequestKind, UserId};
use domain::errors::DomainError;
use domain::events::ChatEvent;
use domain::repositories::ChatRequestRepository;
use std::sync::Arc;

/// 创建聊天请求的输入
#[derive(Debug, Clone)]
pub struct CreateRequestCommand {
    pub requester_id: UserId,
    pub target_id: Option<UserId>,
    pub pet_id: Option<i64>,
    pub message: Option<String>,
    pub kind: Option<RequestKind>,
}

/// 服务依赖集合
pub struct ChatRequestServiceDependencies {
    pub request_repository: Arc<dyn ChatRequestRepository>,
    pub rooms: Arc<RoomService>,
    pub user_directory: Arc<dyn UserDirectory>,
    pub pet_directory: Arc<dyn PetDirectory>,
    pub notifier: Arc<dyn RealtimeNotifier>,
    pub notifications: Arc<dyn NotificationEmitter>,
    pub clock: Arc<dyn Clock>,
}

pub struct ChatRequestService {
    request_repository: Arc<dyn ChatRequestRepository>,
    rooms: Arc<RoomService>,
    user_directory: Arc<dyn UserDirectory>,
    pet_directory: Arc<dyn PetDirectory>,
    notifier: Arc<dyn RealtimeNotifier>,
    notifications: Arc<dyn NotificationEmitter>,
    clock: Arc<dyn Clock>,
}

impl ChatRequestService {
    pub fn new(deps: ChatRequestServiceDependencies) -> Self {
        Self {
            request_repository: deps.request_repository,
            rooms: deps.rooms,
            user_directory: deps.user_directory,
            pet_directory: deps.pet_directory,
            notifier: deps.notifier,
            notifications: deps.notifications,
            clock: deps.clock,
        }
    }

    /// 创建聊天请求
    ///
    /// 目标用户解析顺序：显式指定的目标优先，其次按宠物的登记
    /// 联系人推导。联系人在用户目录中不存在时目标留空并记录意向
    /// ID，由管理员审核时解析。
    pub async fn create_request(
        &self,
        command: CreateRequestCommand,
    ) -> ApplicationResult<ChatRequest> {
        let mut target_id = command.target_id;
        let mut deferred_target = None;

        if target_id.is_none() {
            if let Some(pet_id) = command.pet_id {
                match self.pet_directory.get_pet_contact(pet_id).await? {
                    None => {
                        return Err(DomainError::not_found("pet_contact", pet_id).into());
                    }
                    Some(contact_id) => {
                        if self.user_directory.get_user(contact_id).await?.is_some() {
                            target_id = Some(contact_id);
                        } else {
                            deferred_target = Some(contact_id);
                        }
                    }
                }
            }
        } else if let Some(explicit_id) = target_id {
            if self.user_directory.get_user(explicit_id).await?.is_none() {
                return Err(DomainError::not_found("user", explicit_id).into());
            }
        }

        if target_id == Some(command.requester_id) {
            return Err(
                DomainError::validation_error("target_id", "不能向自己发起聊天请求").into(),
            );
        }

        let mut request = ChatRequest::new(
            command.requester_id,
            target_id,
            command.pet_id,
            command.message,
            command.kind,
        )?;
        if let Some(intended_id) = deferred_target {
            request.defer_target(intended_id);
        }

        // 先做一次配对占用检查给出友好错误，真正的保证在存储约束
        if let Some(target_id) = request.target_id {
            if self
                .request_repository
                .find_open_by_pair(request.requester_id, target_id)
                .await?
                .is_some()
            {
                return Err(DomainError::conflict("该配对上已存在未拒绝的聊天请求").into());
            }
        }

        let created = self.request_repository.create(&request).await?;
        tracing::info!(
            request_id = created.id,
            requester_id = created.requester_id,
            target_id = ?created.target_id,
            "创建聊天请求"
        );

        publish_quietly(
            self.notifier.as_ref(),
            EventScope::User(created.requester_id),
            ChatEvent::RequestCreated {
                request: created.clone(),
            },
        )
        .await;
        if let Some(target_id) = created.target_id {
            publish_quietly(
                self.notifier.as_ref(),
                EventScope::User(target_id),
                ChatEvent::RequestCreated {
                    request: created.clone(),
                },
            )
            .await;
            notify_quietly(
                self.notifications.as_ref(),
                target_id,
                "chat_request_created",
                serde_json::json!({
                    "request_id": created.id,
                    "requester_id": created.requester_id,
                    "pet_id": created.pet_id,
                }),
            )
            .await;
        }

        Ok(created)
    }

    /// 管理员接手审核
    ///
    /// 建立管理员与请求者的审核房间并迁移到 admin_verifying。审核
    /// 房间按请求ID幂等复用，重试不会产生第二个房间。
    pub async fn admin_start_verification(
        &self,
        admin_id: UserId,
        request_id: RequestId,
    ) -> ApplicationResult<ChatRequest> {
        let mut request = self.load(request_id).await?;
        if request.status != ChatRequestStatus::Pending {
            return Err(DomainError::conflict_with_status(
                "只有待处理的请求才能进入审核",
                request.status.as_str(),
            )
            .into());
        }

        let room = match self.rooms.find_by_producing_request(request.id).await? {
            Some(existing) => existing,
            None => {
                match self
                    .rooms
                    .create_adhoc(&[admin_id, request.requester_id], Some(request.id))
                    .await
                {
                    Ok(created) => created,
                    // 并发竞争中另一位管理员已建好审核房间
                    Err(ApplicationError::Domain(DomainError::Conflict { .. })) => self
                        .rooms
                        .find_by_producing_request(request.id)
                        .await?
                        .ok_or_else(|| DomainError::not_found("chat_room", request.id))?,
                    Err(err) => return Err(err),
                }
            }
        };

        request.start_verification(admin_id, room.id)?;
        self.commit(&request, ChatRequestStatus::Pending).await?;

        // 提交成功后把成员校正为本次审核的管理员与请求者。竞争
        // 失败的管理员可能已随房间创建写入成员表，留下会保有发言
        // 权限，必须移出
        self.rooms
            .sync_members(room.id, &[admin_id, request.requester_id])
            .await?;

        tracing::info!(
            request_id = request.id,
            admin_id,
            room_id = room.id,
            "请求进入管理员审核"
        );

        publish_quietly(
            self.notifier.as_ref(),
            EventScope::User(request.requester_id),
            ChatEvent::VerificationStarted {
                request: request.clone(),
            },
        )
        .await;
        notify_quietly(
            self.notifications.as_ref(),
            request.requester_id,
            "chat_request_verifying",
            serde_json::json!({
                "request_id": request.id,
                "room_id": room.id,
            }),
        )
        .await;

        Ok(request)
    }

    /// 管理员完成审核，请求生效
    ///
    /// 解析目标用户，把目标拉入审核房间并绑定规范键；审核房间
    /// 直接成为最终房间，房间身份全程不变。
    pub async fn admin_complete_verification(
        &self,
        admin_id: UserId,
        request_id: RequestId,
        explicit_target_id: Option<UserId>,
    ) -> ApplicationResult<ChatRequest> {
        let mut request = self.load(request_id).await?;
        if request.status != ChatRequestStatus::AdminVerifying {
            return Err(DomainError::conflict_with_status(
                "只有审核中的请求才能完成审核",
                request.status.as_str(),
            )
            .into());
        }
        if request.verifying_admin_id != Some(admin_id) {
            return Err(
                DomainError::permission_denied("只有负责审核的管理员才能完成审核").into(),
            );
        }

        let candidate = request
            .resolution_candidate(explicit_target_id)
            .ok_or_else(|| {
                DomainError::validation_error("target_id", "请求没有可解析的目标用户")
            })?;
        if candidate == request.requester_id {
            return Err(
                DomainError::validation_error("target_id", "目标不能是请求者本人").into(),
            );
        }
        if self.user_directory.get_user(candidate).await?.is_none() {
            // 请求停留在审核中，管理员修正目标后可重试
            return Err(DomainError::unresolved_reference(candidate).into());
        }

        let room_id = request.verification_room_id.ok_or_else(|| {
            DomainError::conflict("审核中的请求缺少审核房间")
        })?;

        // 成员加入与键绑定都是幂等操作，先于状态提交执行，
        // 提交失败后重试会收敛到同样的结果
        self.rooms.add_member(room_id, candidate).await?;
        let room_key = self
            .rooms
            .bind_key(room_id, [request.requester_id, candidate])
            .await?;

        request.complete_verification(admin_id, candidate, self.clock.now())?;
        self.commit(&request, ChatRequestStatus::AdminVerifying)
            .await?;

        tracing::info!(
            request_id = request.id,
            admin_id,
            target_id = candidate,
            room_id,
            room_key = %room_key,
            "审核完成，请求生效"
        );

        for user_id in [request.requester_id, candidate] {
            publish_quietly(
                self.notifier.as_ref(),
                EventScope::User(user_id),
                ChatEvent::RequestApproved {
                    request: request.clone(),
                },
            )
            .await;
        }
        publish_quietly(
            self.notifier.as_ref(),
            EventScope::Room(room_id),
            ChatEvent::MemberAdded {
                room_id,
                user_id: candidate,
            },
        )
        .await;
        notify_quietly(
            self.notifications.as_ref(),
            candidate,
            "chat_request_approved",
            serde_json::json!({
                "request_id": request.id,
                "room_id": room_id,
                "room_key": room_key,
            }),
        )
        .await;

        Ok(request)
    }

    /// 管理员拒绝请求
    pub async fn admin_reject(
        &self,
        admin_id: UserId,
        request_id: RequestId,
        notes: Option<String>,
    ) -> ApplicationResult<ChatRequest> {
        let mut request = self.load(request_id).await?;
        request.reject(notes)?;
        self.commit(&request, ChatRequestStatus::Pending).await?;

        tracing::info!(request_id = request.id, admin_id, "请求被拒绝");

        publish_quietly(
            self.notifier.as_ref(),
            EventScope::User(request.requester_id),
            ChatEvent::RequestRejected {
                request: request.clone(),
            },
        )
        .await;
        notify_quietly(
            self.notifications.as_ref(),
            request.requester_id,
            "chat_request_rejected",
            serde_json::json!({
                "request_id": request.id,
                "notes": request.admin_note,
            }),
        )
        .await;

        Ok(request)
    }

    /// 目标用户答复（遗留的 admin_approved 路径）
    ///
    /// 接受时按两个用户的规范键取得或创建房间；拒绝时请求直接
    /// 到达拒绝终态。
    pub async fn user_accept(
        &self,
        user_id: UserId,
        request_id: RequestId,
        approved: bool,
    ) -> ApplicationResult<ChatRequest> {
        let mut request = self.load(request_id).await?;
        if request.status != ChatRequestStatus::AdminApproved {
            return Err(DomainError::conflict_with_status(
                "只有管理员批准后的请求才能由目标用户答复",
                request.status.as_str(),
            )
            .into());
        }
        if request.target_id != Some(user_id) {
            return Err(DomainError::permission_denied("只有请求目标才能答复请求").into());
        }

        if approved {
            let room = self
                .rooms
                .get_or_create_room([request.requester_id, user_id], Some(request.id))
                .await?;
            request.accept(user_id, true, room.id, self.clock.now())?;
            self.commit(&request, ChatRequestStatus::AdminApproved)
                .await?;

            tracing::info!(
                request_id = request.id,
                user_id,
                room_id = room.id,
                "目标用户接受请求"
            );

            for member_id in [request.requester_id, user_id] {
                publish_quietly(
                    self.notifier.as_ref(),
                    EventScope::User(member_id),
                    ChatEvent::RequestApproved {
                        request: request.clone(),
                    },
                )
                .await;
            }
            notify_quietly(
                self.notifications.as_ref(),
                request.requester_id,
                "chat_request_accepted",
                serde_json::json!({
                    "request_id": request.id,
                    "room_id": room.id,
                }),
            )
            .await;
        } else {
            // 拒绝分支不需要房间
            request.accept(user_id, false, 0, self.clock.now())?;
            self.commit(&request, ChatRequestStatus::AdminApproved)
                .await?;

            tracing::info!(request_id = request.id, user_id, "目标用户谢绝请求");

            publish_quietly(
                self.notifier.as_ref(),
                EventScope::User(request.requester_id),
                ChatEvent::RequestRejected {
                    request: request.clone(),
                },
            )
            .await;
        }

        Ok(request)
    }

    /// 查询单个请求
    pub async fn get_request(&self, request_id: RequestId) -> ApplicationResult<ChatRequest> {
        self.load(request_id).await
    }

    /// 按状态列出请求（管理员工作台）
    pub async fn list_requests_by_status(
        &self,
        status: ChatRequestStatus,
    ) -> ApplicationResult<Vec<ChatRequest>> {
        Ok(self.request_repository.list_by_status(status).await?)
    }

    /// 列出用户参与的请求
    pub async fn list_requests_for_user(
        &self,
        user_id: UserId,
    ) -> ApplicationResult<Vec<ChatRequest>> {
        Ok(self.request_repository.list_for_user(user_id).await?)
    }

    async fn load(&self, request_id: RequestId) -> ApplicationResult<ChatRequest> {
        self.request_repository
            .find_by_id(request_id)
            .await?
            .ok_or_else(|| DomainError::not_found("chat_request", request_id).into())
    }

    /// 条件提交：存储中的状态必须仍为 `expected`
    ///
    /// 检查失败时重新读取真实状态并报告冲突，确保并发迁移最多
    /// 一个成功。
    async fn commit(
        &self,
        request: &ChatRequest,
        expected: ChatRequestStatus,
    ) -> ApplicationResult<()> {
        let updated = self
            .request_repository
            .update_guarded(request, expected)
            .await?;
        if !updated {
            let current_status = self
                .request_repository
                .find_by_id(request.id)
                .await?
                .map(|r| r.status.as_str().to_string());
            return Err(DomainError::Conflict {
                message: "请求状态已被并发修改".to_string(),
                current_status,
            }
            .into());
        }
        Ok(())
    }
}
