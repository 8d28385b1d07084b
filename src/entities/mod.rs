pub mod user;
pub mod session;
pub mod account;
pub mod verification;
pub mod category;
pub mod product;
pub mod product_variant;
pub mod shipping_address;
pub mod cart;
pub mod cart_item;

use sea_orm::sea_query::Index;
use sea_orm::{ConnectionTrait, DatabaseConnection, Schema};

use crate::entities::{
    account::Entity as Account,
    cart::Entity as Cart,
    cart_item::Entity as CartItem,
    category::Entity as Category,
    product::Entity as Product,
    product_variant::Entity as ProductVariant,
    session::Entity as Session,
    shipping_address::Entity as ShippingAddress,
    user::Entity as User,
    verification::Entity as Verification,
};

pub async fn setup_schema(db: &DatabaseConnection) {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    //Referenced tables first, so the foreign keys resolve.
    let tables = vec![
        schema.create_table_from_entity(User),
        schema.create_table_from_entity(Session),
        schema.create_table_from_entity(Account),
        schema.create_table_from_entity(Verification),
        schema.create_table_from_entity(Category),
        schema.create_table_from_entity(Product),
        schema.create_table_from_entity(ProductVariant),
        schema.create_table_from_entity(ShippingAddress),
        schema.create_table_from_entity(Cart),
        schema.create_table_from_entity(CartItem),
    ];

    for mut table in tables {
        db.execute(backend.build(table.if_not_exists()))
            .await
            .expect("Failed to create table schema");
    }

    //Two concurrent first-adds of the same variant must collapse into one
    //row, so the pair gets a unique index rather than trusting the handlers.
    let cart_item_unique = Index::create()
        .name("idx_cart_item_cart_id_product_variant_id")
        .table(CartItem)
        .col(cart_item::Column::CartId)
        .col(cart_item::Column::ProductVariantId)
        .unique()
        .if_not_exists()
        .to_owned();

    db.execute(backend.build(&cart_item_unique))
        .await
        .expect("Failed to create cart_item unique index");
}
