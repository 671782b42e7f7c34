//! 消息服务测试

use crate::clock::FixedClock;
use crate::errors::ApplicationError;
use crate::memory::{
    InMemoryChatRoomRepository, InMemoryMessageRepository, RecordingNotifier,
};
use crate::notifier::EventScope;
use crate::services::message_service::{
    MessageService, MessageServiceDependencies, SendMessageCommand,
};
use crate::services::room_service::RoomService;
use chrono::Utc;
use domain::entities::{MessageKind, RoomAddress, RoomId};
use domain::errors::DomainError;
use std::sync::Arc;

struct Harness {
    service: MessageService,
    rooms: Arc<RoomService>,
    notifier: Arc<RecordingNotifier>,
    room_id: RoomId,
}

async fn harness() -> Harness {
    let rooms = Arc::new(RoomService::new(Arc::new(InMemoryChatRoomRepository::new())));
    let notifier = Arc::new(RecordingNotifier::new());
    let room = rooms.get_or_create_room([3, 6], None).await.unwrap();

    let service = MessageService::new(MessageServiceDependencies {
        message_repository: Arc::new(InMemoryMessageRepository::new()),
        rooms: rooms.clone(),
        notifier: notifier.clone(),
        clock: Arc::new(FixedClock(Utc::now())),
    });

    Harness {
        service,
        rooms,
        notifier,
        room_id: room.id,
    }
}

fn text(room: impl Into<RoomAddress>, sender_id: i64, content: &str) -> SendMessageCommand {
    SendMessageCommand {
        room: room.into(),
        sender_id,
        content: Some(content.to_string()),
        image_url: None,
    }
}

#[tokio::test]
async fn test_send_text_message() {
    let h = harness().await;

    let message = h
        .service
        .send_message(text(h.room_id, 3, "你好"))
        .await
        .unwrap();

    assert!(message.id > 0);
    assert_eq!(message.kind, MessageKind::Text);
    assert_eq!(message.content.as_deref(), Some("你好"));
    assert!(!message.is_read);

    // 房间范围的实时事件
    let envelopes = h.notifier.envelopes().await;
    assert_eq!(envelopes.len(), 1);
    assert_eq!(envelopes[0].scope, EventScope::Room(h.room_id));
    assert_eq!(envelopes[0].event.event_type(), "message_sent");
}

#[tokio::test]
async fn test_send_message_by_room_key() {
    let h = harness().await;
    let message = h
        .service
        .send_message(text(RoomAddress::from("3_6"), 6, "按键寻址"))
        .await
        .unwrap();
    assert_eq!(message.room_id, h.room_id);
}

#[tokio::test]
async fn test_non_member_cannot_send() {
    let h = harness().await;
    let err = h
        .service
        .send_message(text(h.room_id, 9, "我不在房间里"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ApplicationError::Domain(DomainError::PermissionDenied { .. })
    ));
}

#[tokio::test]
async fn test_closed_room_refuses_messages() {
    let h = harness().await;
    h.rooms
        .close_room(&RoomAddress::Id(h.room_id))
        .await
        .unwrap();

    let err = h
        .service
        .send_message(text(h.room_id, 3, "太迟了"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ApplicationError::Domain(DomainError::Conflict { .. })
    ));
}

#[tokio::test]
async fn test_empty_message_rejected() {
    let h = harness().await;

    let err = h
        .service
        .send_message(SendMessageCommand {
            room: h.room_id.into(),
            sender_id: 3,
            content: None,
            image_url: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ApplicationError::Domain(DomainError::Validation { .. })
    ));
}

#[tokio::test]
async fn test_watermark_listing() {
    let h = harness().await;
    for content in ["一", "二", "三"] {
        h.service
            .send_message(text(h.room_id, 3, content))
            .await
            .unwrap();
    }

    let all = h
        .service
        .list_messages(&h.room_id.into(), 0)
        .await
        .unwrap();
    assert_eq!(all.len(), 3);
    // ID随创建顺序单调递增
    assert!(all.windows(2).all(|w| w[0].id < w[1].id));

    let tail = h
        .service
        .list_messages(&h.room_id.into(), all[0].id)
        .await
        .unwrap();
    assert_eq!(tail.len(), 2);
    assert_eq!(tail[0].content.as_deref(), Some("二"));
}

#[tokio::test]
async fn test_mark_read_skips_own_messages() {
    let h = harness().await;
    h.service.send_message(text(h.room_id, 3, "A")).await.unwrap();
    h.service.send_message(text(h.room_id, 3, "B")).await.unwrap();
    h.service.send_message(text(h.room_id, 6, "C")).await.unwrap();

    // 读者只会把他人发送的消息标记为已读
    let affected = h.service.mark_read(&h.room_id.into(), 6).await.unwrap();
    assert_eq!(affected, 2);

    // 重复调用没有新的未读消息
    let affected = h.service.mark_read(&h.room_id.into(), 6).await.unwrap();
    assert_eq!(affected, 0);

    let types = h.notifier.event_types().await;
    assert_eq!(types.iter().filter(|t| **t == "messages_read").count(), 1);
}

#[tokio::test]
async fn test_image_soft_delete() {
    let h = harness().await;
    let message = h
        .service
        .send_message(SendMessageCommand {
            room: h.room_id.into(),
            sender_id: 3,
            content: Some("看这张照片".to_string()),
            image_url: Some("uploads/cat.jpg".to_string()),
        })
        .await
        .unwrap();
    assert_eq!(message.kind, MessageKind::Image);

    // 他人不能删除
    let err = h
        .service
        .soft_delete_image(message.id, 6)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ApplicationError::Domain(DomainError::PermissionDenied { .. })
    ));

    let deleted = h.service.soft_delete_image(message.id, 3).await.unwrap();
    assert!(deleted.is_deleted);
    assert!(deleted.image_url.is_none());
    // 说明文字保留
    assert_eq!(deleted.content.as_deref(), Some("看这张照片"));

    // 重复删除报告冲突
    let err = h
        .service
        .soft_delete_image(message.id, 3)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ApplicationError::Domain(DomainError::Conflict { .. })
    ));

    // 消息行仍然可见
    let listed = h
        .service
        .list_messages(&h.room_id.into(), 0)
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert!(listed[0].is_deleted);
}

#[tokio::test]
async fn test_text_message_cannot_be_image_deleted() {
    let h = harness().await;
    let message = h
        .service
        .send_message(text(h.room_id, 3, "纯文本"))
        .await
        .unwrap();

    let err = h
        .service
        .soft_delete_image(message.id, 3)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ApplicationError::Domain(DomainError::Validation { .. })
    ));
}

#[tokio::test]
async fn test_typing_and_presence_events() {
    let h = harness().await;

    h.service
        .publish_typing(&h.room_id.into(), 3)
        .await
        .unwrap();
    h.service
        .publish_presence(&h.room_id.into(), 6, true)
        .await
        .unwrap();

    let types = h.notifier.event_types().await;
    assert_eq!(types, vec!["typing", "presence"]);

    // 非成员不能发送输入指示
    let err = h
        .service
        .publish_typing(&h.room_id.into(), 9)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ApplicationError::Domain(DomainError::PermissionDenied { .. })
    ));

    // 在线状态同样只对成员开放
    let err = h
        .service
        .publish_presence(&h.room_id.into(), 9, true)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ApplicationError::Domain(DomainError::PermissionDenied { .. })
    ));
    assert_eq!(h.notifier.event_types().await.len(), 2);
}
