//! HTTP contract tests for the payment gateways

use core_kernel::{Currency, Money};
use infra_gateways::{
    normalize_phone, CardGateway, CheckoutRequest, GatewayError, MpesaClient, MpesaConfig,
    MpesaGateway, PaystackClient, PaystackConfig, StkCallback, StkPushRequest,
};
use proptest::prelude::*;
use rust_decimal_macros::dec;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn mpesa_config(server: &MockServer) -> MpesaConfig {
    MpesaConfig {
        consumer_key: "key".into(),
        consumer_secret: "secret".into(),
        shortcode: "174379".into(),
        passkey: "passkey".into(),
        callback_url: "https://example.com/api/v1/payments/mpesa/callback/?secret=abc".into(),
        callback_secret: Some("abc".into()),
        api_url: Some(server.uri()),
        ..Default::default()
    }
}

async fn mount_token(server: &MockServer) {
    // base64("key:secret")
    Mock::given(method("GET"))
        .and(path("/oauth/v1/generate"))
        .and(query_param("grant_type", "client_credentials"))
        .and(header("authorization", "Basic a2V5OnNlY3JldA=="))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok123",
            "expires_in": "3599"
        })))
        .expect(1)
        .mount(server)
        .await;
}

fn push_request() -> StkPushRequest {
    StkPushRequest {
        phone_number: "0712 345 678".into(),
        amount: Money::kes(dec!(1500.40)),
        account_reference: "TXN-2024-00000001".into(),
        description: "Premium payment".into(),
    }
}

mod mpesa_tests {
    use super::*;

    #[tokio::test]
    async fn test_stk_push_sends_daraja_payload() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("POST"))
            .and(path("/mpesa/stkpush/v1/processrequest"))
            .and(header("authorization", "Bearer tok123"))
            .and(body_partial_json(json!({
                "BusinessShortCode": "174379",
                "TransactionType": "CustomerPayBillOnline",
                "Amount": 1501,
                "PartyA": "254712345678",
                "PhoneNumber": "254712345678",
                "AccountReference": "TXN-2024-00000001"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "MerchantRequestID": "29115-34620561-1",
                "CheckoutRequestID": "ws_CO_191220191020363925",
                "ResponseCode": "0",
                "ResponseDescription": "Success. Request accepted for processing",
                "CustomerMessage": "Success. Request accepted for processing"
            })))
            .mount(&server)
            .await;

        let client = MpesaClient::new(mpesa_config(&server)).unwrap();
        let response = client.stk_push(push_request()).await.unwrap();
        assert_eq!(response.checkout_request_id, "ws_CO_191220191020363925");

        // token is cached between calls
        let again = client.stk_push(push_request()).await.unwrap();
        assert_eq!(again.merchant_request_id, "29115-34620561-1");
    }

    #[tokio::test]
    async fn test_stk_push_rejection_carries_message() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("POST"))
            .and(path("/mpesa/stkpush/v1/processrequest"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "requestId": "1",
                "errorCode": "400.002.02",
                "errorMessage": "Bad Request - Invalid PhoneNumber"
            })))
            .mount(&server)
            .await;

        let client = MpesaClient::new(mpesa_config(&server)).unwrap();
        match client.stk_push(push_request()).await {
            Err(GatewayError::Rejected { message, .. }) => {
                assert_eq!(message, "Bad Request - Invalid PhoneNumber")
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failed_token_is_authentication_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/oauth/v1/generate"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = MpesaClient::new(mpesa_config(&server)).unwrap();
        let result = client.stk_query("ws_CO_1").await;
        assert!(matches!(result, Err(GatewayError::Authentication(_))));
    }

    #[tokio::test]
    async fn test_unconfigured_client_does_not_call_out() {
        let server = MockServer::start().await;
        let config = MpesaConfig { api_url: Some(server.uri()), ..Default::default() };
        let client = MpesaClient::new(config).unwrap();
        assert!(matches!(client.stk_query("x").await, Err(GatewayError::NotConfigured(_))));
        assert!(server.received_requests().await.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn test_stk_query_reads_string_result_code() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("POST"))
            .and(path("/mpesa/stkpushquery/v1/query"))
            .and(body_partial_json(json!({ "CheckoutRequestID": "ws_CO_1" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ResponseCode": "0",
                "ResultCode": "1032",
                "ResultDesc": "Request cancelled by user"
            })))
            .mount(&server)
            .await;

        let client = MpesaClient::new(mpesa_config(&server)).unwrap();
        let result = client.stk_query("ws_CO_1").await.unwrap();
        assert_eq!(result.result_code, Some(1032));
        assert!(!result.succeeded());
    }
}

mod callback_tests {
    use super::*;

    #[test]
    fn test_successful_callback_metadata() {
        let payload = json!({
            "Body": {"stkCallback": {
                "MerchantRequestID": "29115-34620561-1",
                "CheckoutRequestID": "ws_CO_191220191020363925",
                "ResultCode": 0,
                "ResultDesc": "The service request is processed successfully.",
                "CallbackMetadata": {"Item": [
                    {"Name": "Amount", "Value": 1.00},
                    {"Name": "MpesaReceiptNumber", "Value": "NLJ7RT61SV"},
                    {"Name": "Balance"},
                    {"Name": "TransactionDate", "Value": 20191219102115u64},
                    {"Name": "PhoneNumber", "Value": 254708374149u64}
                ]}
            }}
        });
        let callback = StkCallback::parse(&payload).unwrap();
        assert!(callback.succeeded());
        assert_eq!(callback.amount, Some(dec!(1)));
        assert_eq!(callback.mpesa_receipt.as_deref(), Some("NLJ7RT61SV"));
        assert_eq!(callback.transaction_date.as_deref(), Some("20191219102115"));
        assert_eq!(callback.metadata()["phone_number"], "254708374149");
    }

    #[test]
    fn test_failed_callback_has_no_receipt() {
        let payload = json!({
            "Body": {"stkCallback": {
                "MerchantRequestID": "1",
                "CheckoutRequestID": "ws_CO_2",
                "ResultCode": 1032,
                "ResultDesc": "Request cancelled by user"
            }}
        });
        let callback = StkCallback::parse(&payload).unwrap();
        assert!(!callback.succeeded());
        assert!(callback.mpesa_receipt.is_none());
        assert_eq!(callback.result_desc, "Request cancelled by user");
    }

    #[test]
    fn test_malformed_callback_rejected() {
        assert!(StkCallback::parse(&json!({ "Body": {} })).is_err());
    }
}

mod paystack_tests {
    use super::*;

    fn client(server: &MockServer) -> PaystackClient {
        PaystackClient::new(PaystackConfig { secret_key: "sk_test_1".into(), api_url: Some(server.uri()) })
            .unwrap()
    }

    #[tokio::test]
    async fn test_initialize_sends_minor_units() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/transaction/initialize"))
            .and(header("authorization", "Bearer sk_test_1"))
            .and(body_partial_json(json!({
                "email": "jane@example.com",
                "amount": 150050,
                "currency": "KES",
                "reference": "TXN-2024-00000002"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": true,
                "message": "Authorization URL created",
                "data": {
                    "authorization_url": "https://checkout.paystack.com/abc",
                    "access_code": "abc",
                    "reference": "TXN-2024-00000002"
                }
            })))
            .mount(&server)
            .await;

        let checkout = client(&server)
            .initialize(CheckoutRequest {
                email: "jane@example.com".into(),
                amount: Money::kes(dec!(1500.50)),
                reference: "TXN-2024-00000002".into(),
                callback_url: None,
                metadata: None,
            })
            .await
            .unwrap();
        assert_eq!(checkout.access_code, "abc");
    }

    #[tokio::test]
    async fn test_verify_converts_amount() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/transaction/verify/TXN-2024-00000002"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": true,
                "message": "Verification successful",
                "data": {"status": "success", "reference": "TXN-2024-00000002", "amount": 150050, "channel": "card"}
            })))
            .mount(&server)
            .await;

        let verification = client(&server).verify("TXN-2024-00000002").await.unwrap();
        assert!(verification.verified);
        assert_eq!(verification.amount, Money::from_minor(150050, Currency::KES));
        assert_eq!(verification.channel.as_deref(), Some("card"));
    }

    #[tokio::test]
    async fn test_error_envelope_is_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/transaction/verify/nope"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "status": false,
                "message": "Transaction reference not found"
            })))
            .mount(&server)
            .await;

        match client(&server).verify("nope").await {
            Err(GatewayError::Rejected { message, .. }) => assert_eq!(message, "Transaction reference not found"),
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_partial_refund() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/refund"))
            .and(body_partial_json(json!({ "transaction": "TXN-2024-00000002", "amount": 50000 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": true,
                "message": "Refund has been queued for processing",
                "data": {"id": 3018284, "status": "pending", "amount": 50000}
            })))
            .mount(&server)
            .await;

        let refund = client(&server)
            .refund("TXN-2024-00000002", Some(Money::kes(dec!(500))))
            .await
            .unwrap();
        assert_eq!(refund.status, "pending");
        assert_eq!(refund.reference.as_deref(), Some("3018284"));
    }
}

proptest! {
    #[test]
    fn prop_normalized_phone_has_country_code(local in "[17][0-9]{8}") {
        let with_zero = normalize_phone(&format!("0{}", local)).unwrap();
        let bare = normalize_phone(&local).unwrap();
        let international = normalize_phone(&format!("+254 {}", local)).unwrap();
        prop_assert_eq!(&with_zero, &bare);
        prop_assert_eq!(&with_zero, &international);
        prop_assert!(with_zero.starts_with("254"));
        prop_assert_eq!(with_zero.len(), 12);
    }

    #[test]
    fn prop_normalization_is_idempotent(raw in "[0-9 +-]{1,15}") {
        if let Ok(once) = normalize_phone(&raw) {
            prop_assert_eq!(normalize_phone(&once).unwrap(), once);
        }
    }
}
