//! End-to-end flows across stores, exercised through two clients sharing one
//! in-memory gateway - one per participant, the way two browsers would share
//! one backend.

use std::sync::Arc;

use kith_client::Client;
use kith_feed::NewPost;
use kith_graph::NewProfile;
use kith_notify::NotificationKind;
use kith_session::AuthUser;
use kith_shared::config::AppConfig;
use kith_shared::gateway::MemoryGateway;

fn two_clients() -> (MemoryGateway, Client, Client) {
    let gw = MemoryGateway::new();
    let client_a = Client::new(Arc::new(gw.clone()), AppConfig::default());
    let client_b = Client::new(Arc::new(gw.clone()), AppConfig::default());
    client_a.sign_in(AuthUser::new("A", "alice"));
    client_b.sign_in(AuthUser::new("B", "bob"));
    (gw, client_a, client_b)
}

fn profile(username: &str) -> NewProfile {
    NewProfile {
        username: username.to_string(),
        email: Some(format!("{username}@example.com")),
        bio: None,
        profile_picture: None,
    }
}

#[tokio::test]
async fn friend_request_accept_end_to_end() {
    let (_gw, client_a, client_b) = two_clients();
    client_a.profiles().create_profile("A", profile("alice")).await;
    client_b.profiles().create_profile("B", profile("bob")).await;
    client_b.notifications().watch_notifications("B");

    // A finds bob and sends the request.
    let hits = client_a.friends().search_users("bob").await;
    assert_eq!(hits.len(), 1);
    client_a.send_friend_request(&hits[0]).await;
    assert_eq!(client_a.friends().error(), None);

    // B sees exactly one pending request from A.
    client_b.friends().fetch_friend_requests("B").await;
    let requests = client_b.friends().friend_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].from, "A");
    assert_eq!(requests[0].to, "B");
    assert_eq!(requests[0].status, "pending");

    // ...and the matching notification.
    let inbox = client_b.notifications().notifications();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].kind, NotificationKind::FriendRequest);
    assert_eq!(inbox[0].sender_name, "alice");

    // B accepts through the notification.
    client_b.respond_to_friend_request(&inbox[0], true).await;
    assert_eq!(client_b.friends().error(), None);

    // Both sides now hold one edge referencing the other.
    let b_friends = client_b.friends().friends();
    assert_eq!(b_friends.len(), 1);
    assert_eq!(b_friends[0].friend_id, "A");

    client_a.friends().fetch_friends("A").await;
    let a_friends = client_a.friends().friends();
    assert_eq!(a_friends.len(), 1);
    assert_eq!(a_friends[0].friend_id, "B");

    // The request and its notification are consumed.
    assert!(client_b.friends().friend_requests().is_empty());
    assert!(client_b.notifications().notifications().is_empty());
}

#[tokio::test]
async fn friend_request_reject_consumes_without_edges() {
    let (gw, client_a, client_b) = two_clients();
    client_b.profiles().create_profile("B", profile("bob")).await;
    client_b.notifications().watch_notifications("B");

    let hits = client_a.friends().search_users("bob").await;
    client_a.send_friend_request(&hits[0]).await;

    let inbox = client_b.notifications().notifications();
    client_b.respond_to_friend_request(&inbox[0], false).await;

    assert_eq!(gw.count("friends"), 0);
    assert_eq!(gw.count("friend_requests"), 0);
    assert!(client_b.notifications().notifications().is_empty());
    assert_eq!(client_b.friends().error(), None);
}

#[tokio::test]
async fn generic_notifications_are_not_consumable_as_requests() {
    let (gw, _client_a, client_b) = two_clients();
    client_b.notifications().watch_notifications("B");
    client_b
        .notifications()
        .add_notification(kith_notify::NewNotification::generic(
            "B", "A", "alice", "hello",
        ))
        .await;

    let inbox = client_b.notifications().notifications();
    client_b.respond_to_friend_request(&inbox[0], true).await;

    // Untouched: still in the inbox, no edges conjured up.
    assert_eq!(client_b.notifications().notifications().len(), 1);
    assert_eq!(gw.count("friends"), 0);
}

#[tokio::test]
async fn likes_propagate_across_clients() {
    let (_gw, client_a, client_b) = two_clients();
    client_a.feed().fetch_posts();
    client_b.feed().fetch_posts();

    client_a
        .feed()
        .create_post(NewPost {
            caption: Some("hello".to_string()),
            image: None,
        })
        .await;

    // B's live feed already has the post.
    let seen_by_b = client_b.feed().posts();
    assert_eq!(seen_by_b.len(), 1);
    assert!(!seen_by_b[0].is_liked);

    client_b.feed().like_post(&seen_by_b[0].id).await;

    // A's subscription picked up B's like.
    let seen_by_a = client_a.feed().posts();
    assert_eq!(seen_by_a[0].likes, vec!["B".to_string()]);
    // Derived flag stays relative to each session user.
    assert!(!seen_by_a[0].is_liked);
    assert!(client_b.feed().posts()[0].is_liked);
}

#[tokio::test]
async fn conversation_flows_between_two_clients() {
    let (_gw, client_a, client_b) = two_clients();
    client_b.chat().watch_conversations("B");

    let conv = client_a
        .chat()
        .start_conversation("A", "alice", "B", "bob")
        .await
        .expect("conversation should be created");
    client_a.chat().send_message(&conv.id, "A", "hi bob").await;

    // B discovers the conversation through the live list.
    let b_list = client_b.chat().conversations();
    assert_eq!(b_list.len(), 1);
    assert_eq!(b_list[0].last_message.as_deref(), Some("hi bob"));
    assert_eq!(b_list[0].partner_name("bob"), Some("alice"));

    // B opens the thread and replies; both threads converge.
    client_b.chat().select_conversation(b_list[0].clone());
    client_b.chat().send_message(&conv.id, "B", "hi alice").await;

    let a_thread: Vec<String> = client_a
        .chat()
        .messages()
        .iter()
        .map(|m| m.text.clone())
        .collect();
    let b_thread: Vec<String> = client_b
        .chat()
        .messages()
        .iter()
        .map(|m| m.text.clone())
        .collect();
    assert_eq!(a_thread, vec!["hi bob", "hi alice"]);
    assert_eq!(a_thread, b_thread);

    // B starting "the same" conversation the other way round dedups.
    let again = client_b
        .chat()
        .start_conversation("B", "bob", "A", "alice")
        .await
        .unwrap();
    assert_eq!(again.id, conv.id);
}

#[tokio::test]
async fn sign_out_resets_every_store() {
    let (gw, client_a, client_b) = two_clients();
    client_a.feed().fetch_posts();
    client_a.notifications().watch_notifications("A");
    client_a.chat().watch_conversations("A");
    client_a
        .feed()
        .create_post(NewPost {
            caption: Some("before logout".to_string()),
            image: None,
        })
        .await;
    assert_eq!(client_a.feed().posts().len(), 1);

    client_a.sign_out();
    assert!(!client_a.session().is_authenticated());
    assert!(client_a.feed().posts().is_empty());
    assert!(client_a.chat().conversations().is_empty());
    assert!(client_a.notifications().notifications().is_empty());

    // Cancelled subscriptions stay quiet even as the world moves on.
    client_b.feed().fetch_posts();
    client_b
        .feed()
        .create_post(NewPost {
            caption: Some("after logout".to_string()),
            image: None,
        })
        .await;
    assert_eq!(gw.count("posts"), 2);
    assert!(client_a.feed().posts().is_empty());
}
