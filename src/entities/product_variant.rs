use sea_orm::entity::prelude::*;
use serde::Serialize;
use crate::entities::product::Entity as Product;

/// A purchasable configuration of a product. Price is kept in integer minor
/// currency units, the image is an externally hosted URL stored verbatim.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "product_variant")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(indexed)]
    pub product_id: Uuid,
    pub name: String,
    #[sea_orm(unique)]
    pub slug: String,
    pub color: String,
    pub price_in_cents: i32,
    pub image_url: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "Product",
        from = "crate::entities::product_variant::Column::ProductId",
        to = "crate::entities::product::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Product,
}

impl ActiveModelBehavior for ActiveModel {}

impl Related<crate::entities::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}
