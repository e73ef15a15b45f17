diesel::table! {
    stations (id) {
        id -> Uuid,
        name -> Text,
        description -> Text,
        station_type -> Text,
        lat -> Double,
        lng -> Double,
        address -> Text,
        facilities -> Array<Text>,
        active -> Bool,
        owner -> Uuid,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    routes (id) {
        id -> Uuid,
        name -> Text,
        description -> Text,
        transport_type -> Text,
        stations -> Array<Uuid>,
        path_lat -> Array<Double>,
        path_lng -> Array<Double>,
        distance -> Double,
        duration -> Nullable<Double>,
        base_price -> Double,
        price_per_station -> Double,
        currency -> Text,
        active -> Bool,
        owner -> Uuid,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}
