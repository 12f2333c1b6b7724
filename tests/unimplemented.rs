mod common;

use bytes::Bytes;
use common::{init_tracing, Entry, MyService, SERVICE};
use rpcstub::{call_pair, CallError, CallOutcome, Dispatcher, ServerStub};

fn unimplemented(method: &str) -> CallError {
    CallError::Unimplemented(format!("{SERVICE}/{method}"))
}

#[tokio::test]
async fn every_shape_answers_unimplemented_by_default() {
    init_tracing();
    let methods = MyService::new();
    let client = common::connect(&ServerStub::new(methods.registry.clone()), &methods);

    // unary
    assert_eq!(client.unary(Entry::new(1)).await, Err(unimplemented("unary")));

    // server streaming
    let mut responses = client.server_streaming(Entry::new(2)).await.unwrap();
    assert_eq!(responses.message().await, Err(unimplemented("server_streaming")));

    // client streaming
    let (requests, response) = client.client_streaming().unwrap();
    let _ = requests.send(Entry::new(3)).await;
    requests.finish();
    assert_eq!(response.await, Err(unimplemented("client_streaming")));

    // bidi streaming
    let (requests, mut responses) = client.bidi_streaming().unwrap();
    let _ = requests.send(Entry::new(4)).await;
    assert_eq!(responses.message().await, Err(unimplemented("bidi_streaming")));

    // undetermined, with and without payloads
    let (_requests, mut responses) = client.unknown().unwrap();
    assert_eq!(responses.message().await, Err(unimplemented("unknown")));

    let (_requests, mut responses) = client.unknown_return().unwrap();
    assert_eq!(responses.message().await, Err(unimplemented("unknown_return")));

    let (requests, mut responses) = client.unknown_argument().unwrap();
    requests.finish();
    assert_eq!(responses.message().await, Err(unimplemented("unknown_argument")));
}

#[tokio::test]
async fn unimplemented_fails_again_on_every_read() {
    let methods = MyService::new();
    let client = common::connect(&ServerStub::new(methods.registry.clone()), &methods);

    let (_requests, mut responses) = client.bidi_streaming().unwrap();
    assert_eq!(responses.message().await, Err(unimplemented("bidi_streaming")));
    assert_eq!(responses.message().await, Err(unimplemented("bidi_streaming")));
}

#[test]
fn unimplemented_answers_without_reading_the_request() {
    let methods = MyService::new();
    let definition = ServerStub::new(methods.registry.clone()).bind();

    for info in definition.methods() {
        assert_eq!(definition.is_implemented(info.method_name()), Some(false));
    }

    let (mut handle, call) = call_pair(4);
    handle
        .requests
        .try_send(Ok(Bytes::from_static(b"never decoded")))
        .unwrap();

    // The default handler settles synchronously: polling once is enough.
    let outcome = futures::executor::block_on(definition.dispatch("service.MyService/unary", call));
    assert_eq!(outcome, CallOutcome::Unimplemented);
    assert!(handle.requests.is_closed());
    assert_eq!(handle.responses.try_recv().unwrap(), Err(unimplemented("unary")));
}

#[tokio::test]
async fn unknown_names_are_unimplemented() {
    let methods = MyService::new();
    let mut dispatcher = Dispatcher::new();
    dispatcher
        .add(ServerStub::new(methods.registry.clone()).bind())
        .unwrap();

    for name in ["service.MyService/missing", "other.Service/unary", "garbage"] {
        let (mut handle, call) = call_pair(1);
        assert_eq!(dispatcher.dispatch(name, call).await, CallOutcome::Unimplemented);
        assert_eq!(
            handle.responses.recv().await,
            Some(Err(CallError::Unimplemented(name.to_owned())))
        );
    }
}
