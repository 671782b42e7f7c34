//! 聊天请求审核流服务测试

use crate::clock::FixedClock;
use crate::directory::{DirectoryError, MockUserDirectory};
use crate::errors::ApplicationError;
use crate::memory::{
    FailingNotifier, InMemoryChatRequestRepository, InMemoryChatRoomRepository,
    InMemoryMessageRepository, InMemoryPetDirectory, InMemoryUserDirectory,
    RecordingNotificationEmitter, RecordingNotifier,
};
use crate::notifier::EventScope;
use crate::services::chat_request_service::{
    ChatRequestService, ChatRequestServiceDependencies, CreateRequestCommand,
};
use crate::services::message_service::{
    MessageService, MessageServiceDependencies, SendMessageCommand,
};
use crate::services::room_service::RoomService;
use chrono::{TimeZone, Utc};
use domain::entities::{ChatRequest, ChatRequestStatus, RequestKind};
use domain::errors::DomainError;
use domain::repositories::{
    ChatRequestRepository, ChatRoomRepository, MockChatRequestRepository,
};
use std::sync::Arc;

const ADMIN: i64 = 1;
const REQUESTER: i64 = 3;
const TARGET: i64 = 6;
const PET: i64 = 42;

struct Harness {
    service: ChatRequestService,
    request_repo: Arc<InMemoryChatRequestRepository>,
    room_repo: Arc<InMemoryChatRoomRepository>,
    users: Arc<InMemoryUserDirectory>,
    pets: Arc<InMemoryPetDirectory>,
    notifier: Arc<RecordingNotifier>,
    notifications: Arc<RecordingNotificationEmitter>,
}

async fn harness() -> Harness {
    let request_repo = Arc::new(InMemoryChatRequestRepository::new());
    let room_repo = Arc::new(InMemoryChatRoomRepository::new());
    let users = Arc::new(InMemoryUserDirectory::new());
    let pets = Arc::new(InMemoryPetDirectory::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let notifications = Arc::new(RecordingNotificationEmitter::new());

    users.insert_stub(ADMIN, "admin").await;
    users.insert_stub(REQUESTER, "alice").await;
    users.insert_stub(TARGET, "bob").await;
    pets.insert_contact(PET, TARGET).await;

    let rooms = Arc::new(RoomService::new(room_repo.clone()));
    let service = ChatRequestService::new(ChatRequestServiceDependencies {
        request_repository: request_repo.clone(),
        rooms,
        user_directory: users.clone(),
        pet_directory: pets.clone(),
        notifier: notifier.clone(),
        notifications: notifications.clone(),
        clock: Arc::new(FixedClock(Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap())),
    });

    Harness {
        service,
        request_repo,
        room_repo,
        users,
        pets,
        notifier,
        notifications,
    }
}

fn claim_command() -> CreateRequestCommand {
    CreateRequestCommand {
        requester_id: REQUESTER,
        target_id: Some(TARGET),
        pet_id: None,
        message: Some("这是我走失的猫".to_string()),
        kind: Some(RequestKind::Claim),
    }
}

#[tokio::test]
async fn test_create_request_with_explicit_target() {
    let h = harness().await;

    let request = h.service.create_request(claim_command()).await.unwrap();

    assert!(request.id > 0);
    assert_eq!(request.status, ChatRequestStatus::Pending);
    assert_eq!(request.target_id, Some(TARGET));

    // 请求者和目标各收到一条实时事件，目标另收到站内通知
    let envelopes = h.notifier.envelopes().await;
    assert_eq!(envelopes.len(), 2);
    assert_eq!(envelopes[0].scope, EventScope::User(REQUESTER));
    assert_eq!(envelopes[1].scope, EventScope::User(TARGET));

    let notices = h.notifications.notices().await;
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].0, TARGET);
    assert_eq!(notices[0].1, "chat_request_created");
}

#[tokio::test]
async fn test_create_request_unknown_target() {
    let h = harness().await;
    let mut command = claim_command();
    command.target_id = Some(999);

    let err = h.service.create_request(command).await.unwrap_err();
    assert!(matches!(
        err,
        ApplicationError::Domain(DomainError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_create_request_to_self_rejected() {
    let h = harness().await;
    let mut command = claim_command();
    command.target_id = Some(REQUESTER);

    let err = h.service.create_request(command).await.unwrap_err();
    assert!(matches!(
        err,
        ApplicationError::Domain(DomainError::Validation { .. })
    ));
}

#[tokio::test]
async fn test_create_request_resolves_target_from_pet() {
    let h = harness().await;
    let command = CreateRequestCommand {
        requester_id: REQUESTER,
        target_id: None,
        pet_id: Some(PET),
        message: None,
        kind: Some(RequestKind::Claim),
    };

    let request = h.service.create_request(command).await.unwrap();
    assert_eq!(request.target_id, Some(TARGET));
    assert!(request.deferred_target_id.is_none());
}

#[tokio::test]
async fn test_create_request_defers_unresolvable_pet_contact() {
    let h = harness().await;
    // 宠物联系人指向用户目录中不存在的用户
    h.pets.insert_contact(77, 999).await;

    let command = CreateRequestCommand {
        requester_id: REQUESTER,
        target_id: None,
        pet_id: Some(77),
        message: None,
        kind: None,
    };

    let request = h.service.create_request(command).await.unwrap();
    assert_eq!(request.status, ChatRequestStatus::Pending);
    assert!(request.target_id.is_none());
    assert_eq!(request.deferred_target_id, Some(999));
    assert!(request.admin_note.is_some());
}

#[tokio::test]
async fn test_duplicate_pair_conflict_until_rejected() {
    let h = harness().await;
    let first = h.service.create_request(claim_command()).await.unwrap();

    let err = h.service.create_request(claim_command()).await.unwrap_err();
    assert!(matches!(
        err,
        ApplicationError::Domain(DomainError::Conflict { .. })
    ));

    // 拒绝释放配对，之后可以重新发起
    h.service
        .admin_reject(ADMIN, first.id, Some("资料不全".to_string()))
        .await
        .unwrap();
    assert!(h.service.create_request(claim_command()).await.is_ok());
}

#[tokio::test]
async fn test_full_verification_flow() {
    let h = harness().await;
    let request = h.service.create_request(claim_command()).await.unwrap();

    // 管理员接手：建立审核房间，请求进入审核
    let request = h
        .service
        .admin_start_verification(ADMIN, request.id)
        .await
        .unwrap();
    assert_eq!(request.status, ChatRequestStatus::AdminVerifying);
    assert_eq!(request.verifying_admin_id, Some(ADMIN));

    let room_id = request.verification_room_id.unwrap();
    let room = h.room_repo.find_by_id(room_id).await.unwrap().unwrap();
    assert!(room.is_member(ADMIN));
    assert!(room.is_member(REQUESTER));
    assert!(room.room_key.is_none());

    // 审核完成：目标入房，键绑定，审核房间即最终房间
    let request = h
        .service
        .admin_complete_verification(ADMIN, request.id, None)
        .await
        .unwrap();
    assert_eq!(request.status, ChatRequestStatus::Active);
    assert_eq!(request.final_room_id, Some(room_id));
    assert_eq!(
        request.admin_approved_at,
        Some(Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap())
    );

    let room = h.room_repo.find_by_id(room_id).await.unwrap().unwrap();
    assert_eq!(room.room_key.as_deref(), Some("3_6"));
    assert!(room.is_member(TARGET));
    assert_eq!(room.member_ids.len(), 3);

    let types = h.notifier.event_types().await;
    assert!(types.contains(&"verification_started"));
    assert!(types.contains(&"request_approved"));
    assert!(types.contains(&"member_added"));
}

#[tokio::test]
async fn test_pet_claim_scenario_end_to_end() {
    let h = harness().await;

    // 用户3就宠物42发起认领，目标从宠物联系人推导为用户6
    let request = h
        .service
        .create_request(CreateRequestCommand {
            requester_id: REQUESTER,
            target_id: None,
            pet_id: Some(PET),
            message: Some("项圈上有我的电话".to_string()),
            kind: Some(RequestKind::Claim),
        })
        .await
        .unwrap();
    assert_eq!(request.status, ChatRequestStatus::Pending);
    assert_eq!(request.target_id, Some(TARGET));

    let request = h
        .service
        .admin_start_verification(ADMIN, request.id)
        .await
        .unwrap();
    let room_id = request.verification_room_id.unwrap();
    let room = h.room_repo.find_by_id(room_id).await.unwrap().unwrap();
    assert_eq!(room.member_ids, vec![ADMIN, REQUESTER]);

    // 目标已知，管理员无需显式指定
    let request = h
        .service
        .admin_complete_verification(ADMIN, request.id, None)
        .await
        .unwrap();
    assert_eq!(request.status, ChatRequestStatus::Active);
    assert_eq!(request.final_room_id, Some(room_id));

    let room = h.room_repo.find_by_id(room_id).await.unwrap().unwrap();
    assert_eq!(room.member_ids, vec![ADMIN, REQUESTER, TARGET]);
    assert_eq!(room.room_key.as_deref(), Some("3_6"));
}

#[tokio::test]
async fn test_start_verification_is_single_shot() {
    let h = harness().await;
    let request = h.service.create_request(claim_command()).await.unwrap();

    h.service
        .admin_start_verification(ADMIN, request.id)
        .await
        .unwrap();

    // 第二次接手报告冲突并携带当前状态，不会产生第二个房间
    let err = h
        .service
        .admin_start_verification(2, request.id)
        .await
        .unwrap_err();
    match err {
        ApplicationError::Domain(DomainError::Conflict { current_status, .. }) => {
            assert_eq!(current_status.as_deref(), Some("admin_verifying"));
        }
        other => panic!("Expected Conflict, got {:?}", other),
    }

    let room = h
        .room_repo
        .find_by_producing_request(request.id)
        .await
        .unwrap()
        .unwrap();
    assert!(room.is_member(ADMIN));
}

#[tokio::test]
async fn test_start_verification_evicts_racing_admin_from_room() {
    let h = harness().await;
    let request = h.service.create_request(claim_command()).await.unwrap();

    // 竞争失败的管理员2已抢先建好审核房间，并随创建写入了成员表
    let rooms = Arc::new(RoomService::new(h.room_repo.clone()));
    rooms
        .create_adhoc(&[2, REQUESTER], Some(request.id))
        .await
        .unwrap();

    // 管理员1赢得状态提交后，房间成员收敛为管理员1与请求者
    h.service
        .admin_start_verification(ADMIN, request.id)
        .await
        .unwrap();

    let room = h
        .room_repo
        .find_by_producing_request(request.id)
        .await
        .unwrap()
        .unwrap();
    let mut members = room.member_ids.clone();
    members.sort_unstable();
    assert_eq!(members, vec![ADMIN, REQUESTER]);

    // 被移出的管理员2不再有发言权限
    let messages = MessageService::new(MessageServiceDependencies {
        message_repository: Arc::new(InMemoryMessageRepository::new()),
        rooms,
        notifier: h.notifier.clone(),
        clock: Arc::new(FixedClock(Utc::now())),
    });
    let err = messages
        .send_message(SendMessageCommand {
            room: room.id.into(),
            sender_id: 2,
            content: Some("审核进展如何".to_string()),
            image_url: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ApplicationError::Domain(DomainError::PermissionDenied { .. })
    ));
}

#[tokio::test]
async fn test_complete_requires_assigned_admin() {
    let h = harness().await;
    let request = h.service.create_request(claim_command()).await.unwrap();
    h.service
        .admin_start_verification(ADMIN, request.id)
        .await
        .unwrap();

    let err = h
        .service
        .admin_complete_verification(2, request.id, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ApplicationError::Domain(DomainError::PermissionDenied { .. })
    ));
}

#[tokio::test]
async fn test_complete_with_unresolvable_target_keeps_state() {
    let h = harness().await;
    let request = h.service.create_request(claim_command()).await.unwrap();
    h.service
        .admin_start_verification(ADMIN, request.id)
        .await
        .unwrap();

    // 管理员显式指定了不存在的目标
    let err = h
        .service
        .admin_complete_verification(ADMIN, request.id, Some(999))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ApplicationError::Domain(DomainError::UnresolvedReference { .. })
    ));

    // 请求停留在审核中，修正目标后重试成功
    let current = h.service.get_request(request.id).await.unwrap();
    assert_eq!(current.status, ChatRequestStatus::AdminVerifying);

    let request = h
        .service
        .admin_complete_verification(ADMIN, request.id, Some(TARGET))
        .await
        .unwrap();
    assert_eq!(request.status, ChatRequestStatus::Active);
}

#[tokio::test]
async fn test_reject_only_from_pending() {
    let h = harness().await;
    let request = h.service.create_request(claim_command()).await.unwrap();
    h.service
        .admin_start_verification(ADMIN, request.id)
        .await
        .unwrap();

    let err = h
        .service
        .admin_reject(ADMIN, request.id, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ApplicationError::Domain(DomainError::Conflict { .. })
    ));
}

#[tokio::test]
async fn test_user_accept_legacy_path() {
    let h = harness().await;
    let request = h.service.create_request(claim_command()).await.unwrap();

    // 模拟遗留数据：管理员批准后等待目标用户答复
    let mut approved = request.clone();
    approved.status = ChatRequestStatus::AdminApproved;
    assert!(h
        .request_repo
        .update_guarded(&approved, ChatRequestStatus::Pending)
        .await
        .unwrap());

    // 非目标用户不能答复
    let err = h
        .service
        .user_accept(REQUESTER, request.id, true)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ApplicationError::Domain(DomainError::PermissionDenied { .. })
    ));

    let accepted = h.service.user_accept(TARGET, request.id, true).await.unwrap();
    assert_eq!(accepted.status, ChatRequestStatus::Active);
    assert!(accepted.user_accepted_at.is_some());

    let room_id = accepted.final_room_id.unwrap();
    let room = h.room_repo.find_by_id(room_id).await.unwrap().unwrap();
    assert_eq!(room.room_key.as_deref(), Some("3_6"));
}

#[tokio::test]
async fn test_user_decline_goes_rejected() {
    let h = harness().await;
    let request = h.service.create_request(claim_command()).await.unwrap();

    let mut approved = request.clone();
    approved.status = ChatRequestStatus::AdminApproved;
    h.request_repo
        .update_guarded(&approved, ChatRequestStatus::Pending)
        .await
        .unwrap();

    let declined = h
        .service
        .user_accept(TARGET, request.id, false)
        .await
        .unwrap();
    assert_eq!(declined.status, ChatRequestStatus::Rejected);
    assert!(declined.final_room_id.is_none());
}

#[tokio::test]
async fn test_list_operations() {
    let h = harness().await;
    h.users.insert_stub(7, "carol").await;

    let first = h.service.create_request(claim_command()).await.unwrap();
    let second = h
        .service
        .create_request(CreateRequestCommand {
            requester_id: 7,
            target_id: Some(TARGET),
            pet_id: None,
            message: None,
            kind: Some(RequestKind::General),
        })
        .await
        .unwrap();

    let pending = h
        .service
        .list_requests_by_status(ChatRequestStatus::Pending)
        .await
        .unwrap();
    assert_eq!(pending.len(), 2);

    let for_target = h.service.list_requests_for_user(TARGET).await.unwrap();
    assert_eq!(for_target.len(), 2);

    let for_requester = h.service.list_requests_for_user(REQUESTER).await.unwrap();
    assert_eq!(
        for_requester.iter().map(|r| r.id).collect::<Vec<_>>(),
        vec![first.id]
    );

    h.service
        .admin_start_verification(ADMIN, second.id)
        .await
        .unwrap();
    let verifying = h
        .service
        .list_requests_by_status(ChatRequestStatus::AdminVerifying)
        .await
        .unwrap();
    assert_eq!(verifying.len(), 1);
    assert_eq!(verifying[0].id, second.id);
}

#[tokio::test]
async fn test_notifier_failure_does_not_block_state_change() {
    let h = harness().await;
    let request_repo = Arc::new(InMemoryChatRequestRepository::new());
    let service = ChatRequestService::new(ChatRequestServiceDependencies {
        request_repository: request_repo.clone(),
        rooms: Arc::new(RoomService::new(Arc::new(InMemoryChatRoomRepository::new()))),
        user_directory: h.users.clone(),
        pet_directory: h.pets.clone(),
        notifier: Arc::new(FailingNotifier),
        notifications: h.notifications.clone(),
        clock: Arc::new(FixedClock(Utc::now())),
    });

    let request = service.create_request(claim_command()).await.unwrap();
    assert_eq!(request.status, ChatRequestStatus::Pending);

    // 状态确实已持久化
    let stored = request_repo.find_by_id(request.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ChatRequestStatus::Pending);
}

#[tokio::test]
async fn test_lost_race_reports_conflict_with_actual_status() {
    let h = harness().await;

    let mut stored = ChatRequest::new(
        REQUESTER,
        Some(TARGET),
        None,
        None,
        Some(RequestKind::Claim),
    )
    .unwrap();
    stored.id = 5;

    // 条件更新返回 false，模拟状态在读取和写入之间被并发修改
    let mut repo = MockChatRequestRepository::new();
    let snapshot = stored.clone();
    repo.expect_find_by_id()
        .returning(move |_| Ok(Some(snapshot.clone())));
    repo.expect_update_guarded().returning(|_, _| Ok(false));

    let service = ChatRequestService::new(ChatRequestServiceDependencies {
        request_repository: Arc::new(repo),
        rooms: Arc::new(RoomService::new(h.room_repo.clone())),
        user_directory: h.users.clone(),
        pet_directory: h.pets.clone(),
        notifier: h.notifier.clone(),
        notifications: h.notifications.clone(),
        clock: Arc::new(FixedClock(Utc::now())),
    });

    let err = service
        .admin_reject(ADMIN, stored.id, None)
        .await
        .unwrap_err();
    match err {
        ApplicationError::Domain(DomainError::Conflict { current_status, .. }) => {
            assert_eq!(current_status.as_deref(), Some("pending"));
        }
        other => panic!("Expected Conflict, got {:?}", other),
    }
}

#[tokio::test]
async fn test_directory_outage_surfaces_as_transient_error() {
    let h = harness().await;

    let mut users = MockUserDirectory::new();
    users
        .expect_get_user()
        .returning(|_| Err(DirectoryError::unavailable("连接超时")));

    let service = ChatRequestService::new(ChatRequestServiceDependencies {
        request_repository: h.request_repo.clone(),
        rooms: Arc::new(RoomService::new(h.room_repo.clone())),
        user_directory: Arc::new(users),
        pet_directory: h.pets.clone(),
        notifier: h.notifier.clone(),
        notifications: h.notifications.clone(),
        clock: Arc::new(FixedClock(Utc::now())),
    });

    let err = service.create_request(claim_command()).await.unwrap_err();
    assert!(matches!(err, ApplicationError::Directory(_)));
}
