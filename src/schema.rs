// Kept in sync by hand with the CREATE TABLE in repository::emisores.

diesel::table! {
    dgii_data (id) {
        id -> Integer,
        orden -> Text,
        rnc -> Text,
        razon_social -> Text,
        nombre_comercial -> Text,
        fecha_autorizacion -> Text,
        fecha_limite -> Text,
        created_at -> Nullable<Text>,
    }
}
