//! Property-based tests for the wire codec
//!
//! Uses proptest to verify the round-trip law and decode robustness across
//! many random envelopes. No shallow tests - every property test verifies
//! a protocol invariant.

use proptest::prelude::*;
use tipjar_core::protocol::{Op, Request, RequestBody, Response, ResponseBody};
use tipjar_core::types::User;
use tipjar_core::wire;

// ===== Helpers =====

fn arbitrary_user() -> impl Strategy<Value = User> {
    (any::<i32>(), ".{0,24}", any::<i32>(), ".{0,40}").prop_map(
        |(id, name, donate, description)| User {
            id,
            name,
            donate,
            description,
        },
    )
}

fn arbitrary_request_body() -> impl Strategy<Value = RequestBody> {
    prop_oneof![
        Just(RequestBody::List),
        any::<i32>().prop_map(|id| RequestBody::Get { id }),
        arbitrary_user().prop_map(|user| RequestBody::Add { user }),
        (any::<i32>(), arbitrary_user()).prop_map(|(id, user)| RequestBody::Update { id, user }),
        any::<i32>().prop_map(|id| RequestBody::Delete { id }),
    ]
}

fn mutating_op() -> impl Strategy<Value = Op> {
    prop_oneof![Just(Op::Add), Just(Op::Update), Just(Op::Delete)]
}

fn any_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::List),
        Just(Op::Get),
        Just(Op::Add),
        Just(Op::Update),
        Just(Op::Delete),
    ]
}

fn arbitrary_response() -> impl Strategy<Value = Response> {
    let tagged_body = prop_oneof![
        prop::collection::vec(arbitrary_user(), 0..8)
            .prop_map(|users| (Op::List, ResponseBody::Users(users))),
        proptest::option::of(arbitrary_user())
            .prop_map(|found| (Op::Get, ResponseBody::Found(found))),
        (mutating_op(), any::<bool>())
            .prop_map(|(op, accepted)| (op, ResponseBody::Accepted(accepted))),
        (any_op(), ".{0,32}").prop_map(|(op, message)| (op, ResponseBody::Error(message))),
    ];
    (any::<u32>(), tagged_body).prop_map(|(correlation, (op, body))| Response {
        correlation,
        op,
        body,
    })
}

// ===== Property Tests =====

proptest! {
    /// Property: request envelopes survive an encode/decode cycle unchanged
    #[test]
    fn request_round_trip(correlation in any::<u32>(), body in arbitrary_request_body()) {
        let request = Request::new(correlation, body);
        let payload = wire::encode_request(&request);
        prop_assert_eq!(wire::decode_request(&payload), Ok(request));
    }

    /// Property: response envelopes survive an encode/decode cycle unchanged
    #[test]
    fn response_round_trip(response in arbitrary_response()) {
        let payload = wire::encode_response(&response);
        prop_assert_eq!(wire::decode_response(&payload), Ok(response));
    }

    /// Property: decoding arbitrary byte soup returns an error or an
    /// envelope, it never panics
    #[test]
    fn decode_never_panics(payload in prop::collection::vec(any::<u8>(), 0..256)) {
        let _ = wire::decode_request(&payload);
        let _ = wire::decode_response(&payload);
    }

    /// Property: a payload with its last byte cut off never decodes, a
    /// frame is all-or-nothing
    #[test]
    fn truncated_payloads_never_decode(correlation in any::<u32>(), body in arbitrary_request_body()) {
        let payload = wire::encode_request(&Request::new(correlation, body));
        prop_assert!(wire::decode_request(&payload[..payload.len() - 1]).is_err());
    }
}
