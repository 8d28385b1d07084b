use sea_orm::entity::prelude::*;
use crate::entities::cart::Entity as Cart;
use crate::entities::product_variant::Entity as ProductVariant;

/// One line of a cart. Repeat adds of the same variant accumulate into
/// `quantity`; the (cart_id, product_variant_id) pair is kept unique by an
/// index created in `setup_schema`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "cart_item")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(indexed)]
    pub cart_id: Uuid,
    pub product_variant_id: Uuid,
    pub quantity: i32,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "Cart",
        from = "crate::entities::cart_item::Column::CartId",
        to = "crate::entities::cart::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Cart,
    #[sea_orm(
        belongs_to = "ProductVariant",
        from = "crate::entities::cart_item::Column::ProductVariantId",
        to = "crate::entities::product_variant::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    ProductVariant,
}

impl ActiveModelBehavior for ActiveModel {}

impl Related<crate::entities::cart::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Cart.def()
    }
}

impl Related<crate::entities::product_variant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProductVariant.def()
    }
}
