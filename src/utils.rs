use js_sys::Reflect;
use wasm_bindgen::JsValue;

pub fn get_attribute<T>(
    object: &JsValue,
    field_name: &str,
    mapper: impl Fn(&JsValue) -> Option<T>,
) -> Result<Option<T>, JsValue> {
    Reflect::get(object, &JsValue::from_str(field_name)).map(|x| mapper(&x))
}

/// Like [`get_attribute`], for callers that treat a missing field and a
/// failed lookup alike.
pub fn read_attribute<T>(
    object: &JsValue,
    field_name: &str,
    mapper: impl Fn(&JsValue) -> Option<T>,
) -> Option<T> {
    get_attribute(object, field_name, mapper).ok().flatten()
}
