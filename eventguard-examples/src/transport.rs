//! HTTP boundary helpers.
//!
//! No server lives here. These functions show how a transport maps request
//! fields onto command envelopes and command outcomes onto status codes and
//! `ETag` headers.

use eventguard::{
    parse_weak_etag, CommandEnvelope, CommandError, CommandOutcome, ETagError, ExpectedRevision,
    Rejection,
};
use thiserror::Error;
use tracing::debug;

use crate::shopping_cart::{AddProductItemToShoppingCart, ProductId, ProductItem, Quantity};

/// HTTP status for an outcome code.
///
/// Domain rejections not listed here are conflicts with the current state.
pub fn status_for(code: &str) -> u16 {
    match code {
        "STREAM_NOT_FOUND" | "SHOPPING_CART_NOT_OPENED" | "CASH_REGISTER_NOT_PLACED" => 404,
        "FAILED_TO_APPEND_EVENT" => 412,
        "INVALID_ETAG"
        | "INVALID_STREAM_NAME"
        | "MISSING_SHOPPING_CART_ID"
        | "MISSING_PRODUCT_ID"
        | "INVALID_PRODUCT_ITEM_QUANTITY" => 400,
        "AGGREGATE_STATE_INVALID" | "EVENT_STORE_FAILURE" => 500,
        "TIMEOUT" => 503,
        _ => 409,
    }
}

/// A malformed request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// No cart id in the path.
    #[error("shopping cart id is missing")]
    MissingShoppingCartId,
    /// No usable product id in the body.
    #[error("product id is missing")]
    MissingProductId,
    /// Quantity absent, zero or negative.
    #[error("product item quantity is invalid")]
    InvalidProductItemQuantity,
    /// `If-Match` header present but not a weak revision tag.
    #[error(transparent)]
    InvalidETag(#[from] ETagError),
}

impl RequestError {
    /// Stable machine-readable code.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MissingShoppingCartId => "MISSING_SHOPPING_CART_ID",
            Self::MissingProductId => "MISSING_PRODUCT_ID",
            Self::InvalidProductItemQuantity => "INVALID_PRODUCT_ITEM_QUANTITY",
            Self::InvalidETag(error) => error.code(),
        }
    }
}

/// Raw fields of an add-product-item request.
#[derive(Debug, Clone, Default)]
pub struct AddProductItemRequest {
    /// Path parameter.
    pub shopping_cart_id: Option<String>,
    /// Body field.
    pub product_id: Option<String>,
    /// Body field.
    pub quantity: Option<i64>,
    /// `If-Match` header.
    pub if_match: Option<String>,
}

impl AddProductItemRequest {
    /// Validates the request and builds the command envelope.
    ///
    /// A present `If-Match` header pins the append to that revision. Without
    /// it the append is checked against the revision the command read.
    pub fn into_envelope(
        self,
    ) -> Result<CommandEnvelope<AddProductItemToShoppingCart>, RequestError> {
        let shopping_cart_id = self
            .shopping_cart_id
            .filter(|id| !id.trim().is_empty())
            .ok_or(RequestError::MissingShoppingCartId)?;
        let product_id = self
            .product_id
            .and_then(|id| ProductId::try_new(id).ok())
            .ok_or(RequestError::MissingProductId)?;
        let quantity = self
            .quantity
            .and_then(|quantity| u32::try_from(quantity).ok())
            .and_then(|quantity| Quantity::try_new(quantity).ok())
            .ok_or(RequestError::InvalidProductItemQuantity)?;
        let expected = self.if_match.as_deref().map(parse_weak_etag).transpose()?;

        let envelope = CommandEnvelope::new(AddProductItemToShoppingCart {
            shopping_cart_id,
            product_item: ProductItem {
                product_id,
                quantity,
            },
        });
        Ok(match expected {
            Some(revision) => envelope.with_expected_revision(ExpectedRevision::Exact(revision)),
            None => envelope,
        })
    }
}

/// What a transport writes back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// HTTP status.
    pub status: u16,
    /// `ETag` header carrying the next expected revision, on success.
    pub etag: Option<String>,
    /// Outcome code, on failure.
    pub code: Option<&'static str>,
}

impl Response {
    /// Success without a body.
    pub fn no_content(outcome: &CommandOutcome) -> Self {
        Self {
            status: 204,
            etag: Some(outcome.etag()),
            code: None,
        }
    }

    /// Failure for an outcome code.
    pub fn failure(code: &'static str) -> Self {
        Self {
            status: status_for(code),
            etag: None,
            code: Some(code),
        }
    }
}

impl From<RequestError> for Response {
    fn from(error: RequestError) -> Self {
        Self::failure(error.code())
    }
}

/// Maps a command result onto a response.
pub fn respond<R: Rejection>(result: Result<CommandOutcome, CommandError<R>>) -> Response {
    match result {
        Ok(outcome) => Response::no_content(&outcome),
        Err(error) => {
            debug!(code = error.code(), %error, "transport.command_failed");
            Response::failure(error.code())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> AddProductItemRequest {
        AddProductItemRequest {
            shopping_cart_id: Some("cart-1".to_string()),
            product_id: Some("shoes".to_string()),
            quantity: Some(2),
            if_match: None,
        }
    }

    #[test]
    fn outcome_codes_map_like_the_route() {
        assert_eq!(status_for("STREAM_NOT_FOUND"), 404);
        assert_eq!(status_for("FAILED_TO_APPEND_EVENT"), 412);
        assert_eq!(status_for("SHOPPING_CART_CLOSED"), 409);
        assert_eq!(status_for("INVALID_ETAG"), 400);
        assert_eq!(status_for("TIMEOUT"), 503);
    }

    #[test]
    fn missing_if_match_leaves_expectation_to_the_read() {
        let envelope = request().into_envelope().unwrap();
        assert_eq!(envelope.metadata.expected_revision, None);
    }

    #[test]
    fn if_match_pins_the_expected_revision() {
        let envelope = AddProductItemRequest {
            if_match: Some("W/\"7\"".to_string()),
            ..request()
        }
        .into_envelope()
        .unwrap();

        assert_eq!(
            envelope.metadata.expected_revision,
            Some(ExpectedRevision::Exact(eventguard::StreamRevision::new(7)))
        );
    }

    #[test]
    fn request_fields_are_validated_in_order() {
        let cases = [
            (
                AddProductItemRequest {
                    shopping_cart_id: Some(" ".to_string()),
                    ..request()
                },
                "MISSING_SHOPPING_CART_ID",
            ),
            (
                AddProductItemRequest {
                    product_id: None,
                    ..request()
                },
                "MISSING_PRODUCT_ID",
            ),
            (
                AddProductItemRequest {
                    quantity: Some(0),
                    ..request()
                },
                "INVALID_PRODUCT_ITEM_QUANTITY",
            ),
            (
                AddProductItemRequest {
                    quantity: Some(-3),
                    ..request()
                },
                "INVALID_PRODUCT_ITEM_QUANTITY",
            ),
            (
                AddProductItemRequest {
                    if_match: Some("\"7\"".to_string()),
                    ..request()
                },
                "INVALID_ETAG",
            ),
        ];

        for (request, code) in cases {
            let error = request.into_envelope().unwrap_err();
            assert_eq!(error.code(), code);
            assert_eq!(Response::from(error).status, 400);
        }
    }
}
