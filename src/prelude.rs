//! Canteen prelude.
//!
//! Convenience exports for common library consumers.

pub use crate::{
    cart::{
        Cart, CartError, CartStorage, CartStorageError, CartStore, FileCartStorage, LineItem,
        Meal, MemoryCartStorage,
    },
    checkout::{
        CheckoutDraft, CheckoutError, DEFAULT_AUTHORIZED_FEE, OrderRequest, ProfileField,
        RecipientSelection, ValidationError, Violation, build_order_request, validate_draft,
    },
    delivery::{
        DeliveryProfile, DeliveryTarget, ExternalRecipient, RecipientOverrides, RecipientRecord,
    },
    money::{Amount, AmountError},
    orders::{
        CancelReason, Effect, Order, OrderAction, OrderStatus, OrderUuid, Party, Shortfall,
        Transition, TransitionError, UnknownStatus, plan,
    },
    settlement::{
        EntryKind, LedgerEntry, LedgerError, MemoryLedger, Settlement, SettlementError,
        WalletLedger,
    },
    summary::{cart_table, order_table},
};
