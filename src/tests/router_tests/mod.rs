mod export_tests;
mod preset_audit_tests;
mod tender_tests;
