diesel::table! {
    inventory (id) {
        id -> Uuid,
        product_id -> Uuid,
        warehouse_id -> Uuid,
        quantity -> Int4,
        reserved_qty -> Int4,
        low_stock_threshold -> Int4,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    stock_movements (id) {
        id -> Uuid,
        seq -> Int8,
        inventory_id -> Uuid,
        movement_type -> Varchar,
        quantity -> Int4,
        order_id -> Nullable<Uuid>,
        reason -> Varchar,
        created_at -> Timestamptz,
    }
}

diesel::joinable!(stock_movements -> inventory (inventory_id));

diesel::allow_tables_to_appear_in_same_query!(
    inventory,
    stock_movements,
);
