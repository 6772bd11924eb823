pub mod adms_routes;
pub mod batch_routes;
pub mod device_routes;
