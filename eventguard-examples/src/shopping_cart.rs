//! Shopping cart aggregate.
//!
//! A client opens a cart, adds and removes product items while the cart is
//! pending, and finally confirms it. A confirmed cart is closed to every
//! further change.

use chrono::{DateTime, Utc};
use eventguard::{Aggregate, CommandLogic, Event, NewEvents, Rejection, StreamRequirement};
use nutype::nutype;
use serde::{Deserialize, Serialize};

/// Product identifier.
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 100),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        Display,
        AsRef,
        Serialize,
        Deserialize
    )
)]
pub struct ProductId(String);

/// Number of units of one product, always at least one.
#[nutype(
    validate(greater_or_equal = 1),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Display,
        Into,
        Serialize,
        Deserialize
    )
)]
pub struct Quantity(u32);

/// A quantity of one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductItem {
    /// The product.
    pub product_id: ProductId,
    /// How many units.
    pub quantity: Quantity,
}

/// Events of the shopping cart stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum ShoppingCartEvent {
    /// The cart was opened for a client.
    ShoppingCartOpened {
        /// Cart id.
        shopping_cart_id: String,
        /// Owning client.
        client_id: String,
    },
    /// Units of a product were put in the cart.
    ProductItemAdded {
        /// What was added.
        product_item: ProductItem,
    },
    /// Units of a product were taken out of the cart.
    ProductItemRemoved {
        /// What was removed.
        product_item: ProductItem,
    },
    /// The cart was confirmed and closed.
    ShoppingCartConfirmed {
        /// When the client confirmed.
        confirmed_at: DateTime<Utc>,
    },
}

impl Event for ShoppingCartEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::ShoppingCartOpened { .. } => "shopping-cart-opened",
            Self::ProductItemAdded { .. } => "product-item-added",
            Self::ProductItemRemoved { .. } => "product-item-removed",
            Self::ShoppingCartConfirmed { .. } => "shopping-cart-confirmed",
        }
    }

    fn all_event_types() -> &'static [&'static str] {
        &[
            "shopping-cart-opened",
            "product-item-added",
            "product-item-removed",
            "shopping-cart-confirmed",
        ]
    }
}

/// Lifecycle of a cart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShoppingCartStatus {
    /// Open for changes.
    #[default]
    Pending,
    /// Confirmed; no further changes.
    Confirmed,
}

/// A complete shopping cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShoppingCart {
    /// Cart id.
    pub id: String,
    /// Owning client.
    pub client_id: String,
    /// Current lifecycle status.
    pub status: ShoppingCartStatus,
    /// Items in the order they were first added, one entry per product.
    pub product_items: Vec<ProductItem>,
    /// Set once the cart is confirmed.
    pub confirmed_at: Option<DateTime<Utc>>,
}

impl ShoppingCart {
    /// Whether the cart still accepts changes.
    pub fn is_closed(&self) -> bool {
        self.status == ShoppingCartStatus::Confirmed
    }

    /// Units of `product_id` currently in the cart.
    pub fn quantity_of(&self, product_id: &ProductId) -> u32 {
        self.product_items
            .iter()
            .find(|item| &item.product_id == product_id)
            .map_or(0, |item| item.quantity.into_inner())
    }
}

/// Fold accumulator for [`ShoppingCart`].
#[derive(Debug, Clone, Default)]
pub struct ShoppingCartState {
    id: Option<String>,
    client_id: Option<String>,
    status: ShoppingCartStatus,
    product_items: Vec<ProductItem>,
    confirmed_at: Option<DateTime<Utc>>,
}

impl ShoppingCartState {
    /// Merges `added` into its product line. A total beyond `u32::MAX`
    /// saturates; deciding refuses such additions before they are written.
    fn add(mut self, added: &ProductItem) -> Self {
        match self
            .product_items
            .iter_mut()
            .find(|item| item.product_id == added.product_id)
        {
            Some(item) => {
                let total = item
                    .quantity
                    .into_inner()
                    .saturating_add(added.quantity.into_inner());
                if let Ok(total) = Quantity::try_new(total) {
                    item.quantity = total;
                }
            }
            None => self.product_items.push(added.clone()),
        }
        self
    }

    fn remove(mut self, removed: &ProductItem) -> Self {
        let Some(position) = self
            .product_items
            .iter()
            .position(|item| item.product_id == removed.product_id)
        else {
            return self;
        };

        let left = self.product_items[position]
            .quantity
            .into_inner()
            .saturating_sub(removed.quantity.into_inner());
        match Quantity::try_new(left) {
            Ok(left) => self.product_items[position].quantity = left,
            Err(_) => {
                self.product_items.remove(position);
            }
        }
        self
    }
}

impl Aggregate for ShoppingCart {
    const KIND: &'static str = "shoppingcart";
    type Event = ShoppingCartEvent;
    type State = ShoppingCartState;

    fn when(state: ShoppingCartState, event: &ShoppingCartEvent) -> ShoppingCartState {
        match event {
            ShoppingCartEvent::ShoppingCartOpened {
                shopping_cart_id,
                client_id,
            } => ShoppingCartState {
                id: Some(shopping_cart_id.clone()),
                client_id: Some(client_id.clone()),
                ..ShoppingCartState::default()
            },
            ShoppingCartEvent::ProductItemAdded { product_item } => state.add(product_item),
            ShoppingCartEvent::ProductItemRemoved { product_item } => state.remove(product_item),
            ShoppingCartEvent::ShoppingCartConfirmed { confirmed_at } => ShoppingCartState {
                status: ShoppingCartStatus::Confirmed,
                confirmed_at: Some(*confirmed_at),
                ..state
            },
        }
    }

    fn complete(state: ShoppingCartState) -> Option<Self> {
        let id = state.id.filter(|id| !id.is_empty())?;
        let client_id = state.client_id.filter(|id| !id.is_empty())?;
        Some(Self {
            id,
            client_id,
            status: state.status,
            product_items: state.product_items,
            confirmed_at: state.confirmed_at,
        })
    }
}

/// Why a shopping cart command was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShoppingCartRejection {
    /// A cart with this id was already opened.
    #[error("shopping cart already exists")]
    AlreadyExists,
    /// The cart has not been opened.
    #[error("shopping cart does not exist")]
    NotOpened,
    /// The cart is confirmed and takes no more changes.
    #[error("shopping cart is closed")]
    Closed,
    /// The product is not in the cart.
    #[error("product item '{0}' is not in the cart")]
    ProductItemNotFound(ProductId),
    /// Fewer units are in the cart than the removal asks for.
    #[error("cannot remove {requested} of product '{product_id}', only {available} in the cart")]
    InsufficientProductQuantity {
        /// The product.
        product_id: ProductId,
        /// Units in the cart.
        available: u32,
        /// Units asked for.
        requested: u32,
    },
    /// The product line would exceed the largest representable quantity.
    #[error("adding {requested} of product '{product_id}' to {available} exceeds the quantity limit")]
    ProductQuantityTooLarge {
        /// The product.
        product_id: ProductId,
        /// Units in the cart.
        available: u32,
        /// Units asked for.
        requested: u32,
    },
    /// Confirming a cart with nothing in it.
    #[error("shopping cart is empty")]
    Empty,
}

impl Rejection for ShoppingCartRejection {
    fn code(&self) -> &'static str {
        match self {
            Self::AlreadyExists => "SHOPPING_CART_ALREADY_EXISTS",
            Self::NotOpened => "SHOPPING_CART_NOT_OPENED",
            Self::Closed => "SHOPPING_CART_CLOSED",
            Self::ProductItemNotFound(_) => "PRODUCT_ITEM_NOT_FOUND",
            Self::InsufficientProductQuantity { .. } => "INSUFFICIENT_PRODUCT_QUANTITY",
            Self::ProductQuantityTooLarge { .. } => "PRODUCT_ITEM_QUANTITY_TOO_LARGE",
            Self::Empty => "SHOPPING_CART_EMPTY",
        }
    }
}

fn open_cart(current: Option<&ShoppingCart>) -> Result<&ShoppingCart, ShoppingCartRejection> {
    let cart = current.ok_or(ShoppingCartRejection::NotOpened)?;
    if cart.is_closed() {
        return Err(ShoppingCartRejection::Closed);
    }
    Ok(cart)
}

/// Opens a new cart for a client.
#[derive(Debug, Clone)]
pub struct OpenShoppingCart {
    /// Id of the new cart.
    pub shopping_cart_id: String,
    /// Owning client.
    pub client_id: String,
}

impl CommandLogic for OpenShoppingCart {
    type Aggregate = ShoppingCart;
    type Rejection = ShoppingCartRejection;

    fn aggregate_id(&self) -> &str {
        &self.shopping_cart_id
    }

    fn requirement(&self) -> StreamRequirement {
        StreamRequirement::MayBeNew
    }

    fn decide(
        &self,
        current: Option<&ShoppingCart>,
    ) -> Result<NewEvents<ShoppingCartEvent>, ShoppingCartRejection> {
        if current.is_some() {
            return Err(ShoppingCartRejection::AlreadyExists);
        }
        Ok(NewEvents::one(ShoppingCartEvent::ShoppingCartOpened {
            shopping_cart_id: self.shopping_cart_id.clone(),
            client_id: self.client_id.clone(),
        }))
    }
}

/// Puts units of a product into a pending cart.
#[derive(Debug, Clone)]
pub struct AddProductItemToShoppingCart {
    /// Target cart.
    pub shopping_cart_id: String,
    /// What to add.
    pub product_item: ProductItem,
}

impl CommandLogic for AddProductItemToShoppingCart {
    type Aggregate = ShoppingCart;
    type Rejection = ShoppingCartRejection;

    fn aggregate_id(&self) -> &str {
        &self.shopping_cart_id
    }

    fn decide(
        &self,
        current: Option<&ShoppingCart>,
    ) -> Result<NewEvents<ShoppingCartEvent>, ShoppingCartRejection> {
        let cart = open_cart(current)?;
        let product_id = &self.product_item.product_id;
        let available = cart.quantity_of(product_id);
        let requested = self.product_item.quantity.into_inner();
        if available.checked_add(requested).is_none() {
            return Err(ShoppingCartRejection::ProductQuantityTooLarge {
                product_id: product_id.clone(),
                available,
                requested,
            });
        }
        Ok(NewEvents::one(ShoppingCartEvent::ProductItemAdded {
            product_item: self.product_item.clone(),
        }))
    }
}

/// Takes units of a product out of a pending cart.
#[derive(Debug, Clone)]
pub struct RemoveProductItemFromShoppingCart {
    /// Target cart.
    pub shopping_cart_id: String,
    /// What to remove.
    pub product_item: ProductItem,
}

impl CommandLogic for RemoveProductItemFromShoppingCart {
    type Aggregate = ShoppingCart;
    type Rejection = ShoppingCartRejection;

    fn aggregate_id(&self) -> &str {
        &self.shopping_cart_id
    }

    fn decide(
        &self,
        current: Option<&ShoppingCart>,
    ) -> Result<NewEvents<ShoppingCartEvent>, ShoppingCartRejection> {
        let cart = open_cart(current)?;
        let product_id = &self.product_item.product_id;
        let requested = self.product_item.quantity.into_inner();

        match cart.quantity_of(product_id) {
            0 => Err(ShoppingCartRejection::ProductItemNotFound(product_id.clone())),
            available if available < requested => {
                Err(ShoppingCartRejection::InsufficientProductQuantity {
                    product_id: product_id.clone(),
                    available,
                    requested,
                })
            }
            _ => Ok(NewEvents::one(ShoppingCartEvent::ProductItemRemoved {
                product_item: self.product_item.clone(),
            })),
        }
    }
}

/// Confirms a pending, non-empty cart.
#[derive(Debug, Clone)]
pub struct ConfirmShoppingCart {
    /// Target cart.
    pub shopping_cart_id: String,
    /// Confirmation instant, fixed by the caller so deciding stays pure.
    pub confirmed_at: DateTime<Utc>,
}

impl ConfirmShoppingCart {
    /// Confirms `shopping_cart_id` as of now.
    pub fn now(shopping_cart_id: impl Into<String>) -> Self {
        Self {
            shopping_cart_id: shopping_cart_id.into(),
            confirmed_at: Utc::now(),
        }
    }
}

impl CommandLogic for ConfirmShoppingCart {
    type Aggregate = ShoppingCart;
    type Rejection = ShoppingCartRejection;

    fn aggregate_id(&self) -> &str {
        &self.shopping_cart_id
    }

    fn decide(
        &self,
        current: Option<&ShoppingCart>,
    ) -> Result<NewEvents<ShoppingCartEvent>, ShoppingCartRejection> {
        let cart = open_cart(current)?;
        if cart.product_items.is_empty() {
            return Err(ShoppingCartRejection::Empty);
        }
        Ok(NewEvents::one(ShoppingCartEvent::ShoppingCartConfirmed {
            confirmed_at: self.confirmed_at,
        }))
    }
}
