pub mod badges;
pub mod survey;
