use chrono::{TimeZone, Utc};
use eventguard::{fold_slice, Aggregate, CommandEnvelope, CommandExecutor, EventStore};
use eventguard_examples::shopping_cart::{
    AddProductItemToShoppingCart, ConfirmShoppingCart, OpenShoppingCart, ProductId, ProductItem,
    Quantity, RemoveProductItemFromShoppingCart, ShoppingCart, ShoppingCartStatus,
};
use eventguard_examples::transport::{respond, AddProductItemRequest, Response};
use eventguard_memory::InMemoryEventStore;

fn item(product_id: &str, quantity: u32) -> ProductItem {
    ProductItem {
        product_id: ProductId::try_new(product_id).unwrap(),
        quantity: Quantity::try_new(quantity).unwrap(),
    }
}

fn open(cart_id: &str) -> CommandEnvelope<OpenShoppingCart> {
    CommandEnvelope::new(OpenShoppingCart {
        shopping_cart_id: cart_id.to_string(),
        client_id: "client-1".to_string(),
    })
}

fn add_request(cart_id: &str, if_match: Option<String>) -> AddProductItemRequest {
    AddProductItemRequest {
        shopping_cart_id: Some(cart_id.to_string()),
        product_id: Some("shoes".to_string()),
        quantity: Some(1),
        if_match,
    }
}

#[tokio::test]
async fn cart_goes_from_open_to_confirmed() {
    // Given: an empty store
    let store = InMemoryEventStore::new();
    let executor = CommandExecutor::new(&store);

    // When: a client fills and confirms a cart
    executor.handle(open("cart-1")).await.unwrap();
    for (product_id, quantity) in [("shoes", 2), ("socks", 3), ("shoes", 1)] {
        executor
            .handle(CommandEnvelope::new(AddProductItemToShoppingCart {
                shopping_cart_id: "cart-1".to_string(),
                product_item: item(product_id, quantity),
            }))
            .await
            .unwrap();
    }
    executor
        .handle(CommandEnvelope::new(RemoveProductItemFromShoppingCart {
            shopping_cart_id: "cart-1".to_string(),
            product_item: item("socks", 1),
        }))
        .await
        .unwrap();
    let confirmed_at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    let outcome = executor
        .handle(CommandEnvelope::new(ConfirmShoppingCart {
            shopping_cart_id: "cart-1".to_string(),
            confirmed_at,
        }))
        .await
        .unwrap();

    // Then: six events were written and the cart folds to its final state
    assert_eq!(outcome.stream_name.as_ref(), "shoppingcart-cart-1");
    assert_eq!(outcome.etag(), "W/\"6\"");

    let slice = store.read_stream(&outcome.stream_name).await.unwrap();
    let cart: ShoppingCart = fold_slice(&slice).unwrap();
    assert_eq!(cart.status, ShoppingCartStatus::Confirmed);
    assert_eq!(cart.confirmed_at, Some(confirmed_at));
    assert_eq!(cart.product_items, vec![item("shoes", 3), item("socks", 2)]);
}

#[tokio::test]
async fn confirmed_cart_answers_conflict() {
    let store = InMemoryEventStore::new();
    let executor = CommandExecutor::new(&store);
    executor.handle(open("cart-1")).await.unwrap();
    executor
        .handle(add_request("cart-1", None).into_envelope().unwrap())
        .await
        .unwrap();
    executor
        .handle(CommandEnvelope::new(ConfirmShoppingCart::now("cart-1")))
        .await
        .unwrap();

    let response = respond(
        executor
            .handle(add_request("cart-1", None).into_envelope().unwrap())
            .await,
    );

    assert_eq!(
        response,
        Response {
            status: 409,
            etag: None,
            code: Some("SHOPPING_CART_CLOSED"),
        }
    );
}

#[tokio::test]
async fn stale_if_match_answers_precondition_failed() {
    // Given: two clients that both saw the cart right after it was opened
    let store = InMemoryEventStore::new();
    let executor = CommandExecutor::new(&store);
    let opened = executor.handle(open("cart-1")).await.unwrap();
    let seen = opened.etag();

    // When: both add an item using the tag they saw
    let first = respond(
        executor
            .handle(add_request("cart-1", Some(seen.clone())).into_envelope().unwrap())
            .await,
    );
    let second = respond(
        executor
            .handle(add_request("cart-1", Some(seen)).into_envelope().unwrap())
            .await,
    );

    // Then: the first gets the next tag, the second is told to refetch
    assert_eq!(first.status, 204);
    assert_eq!(first.etag.as_deref(), Some("W/\"2\""));
    assert_eq!(second.status, 412);
    assert_eq!(second.code, Some("FAILED_TO_APPEND_EVENT"));

    let stream_name = ShoppingCart::stream_name("cart-1").unwrap();
    let slice = store.read_stream(&stream_name).await.unwrap();
    assert_eq!(slice.len(), 2);
}

#[tokio::test]
async fn unknown_cart_answers_not_found() {
    let store = InMemoryEventStore::new();

    let response = respond(
        CommandExecutor::new(&store)
            .handle(add_request("missing", None).into_envelope().unwrap())
            .await,
    );

    assert_eq!(response.status, 404);
    assert_eq!(response.code, Some("STREAM_NOT_FOUND"));
}

#[tokio::test]
async fn opening_twice_is_a_conflict() {
    let store = InMemoryEventStore::new();
    let executor = CommandExecutor::new(&store);
    executor.handle(open("cart-1")).await.unwrap();

    let response = respond(executor.handle(open("cart-1")).await);

    assert_eq!(response.status, 409);
    assert_eq!(response.code, Some("SHOPPING_CART_ALREADY_EXISTS"));
}
