#[macro_export]
macro_rules! new_id {
    ($it:ident) => {
        index_vec::define_index_type! {
            pub struct $it = u32;
            DISPLAY_FORMAT = "{}";
        }
    };
    ($it:ident, $vt:ident) => {
        $crate::type_utils::new_id!($it);
        #[allow(dead_code)]
        pub type $vt<T> = index_vec::IndexVec<$it, T>;
    };
}
pub(crate) use new_id;
