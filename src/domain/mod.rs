// 領域層：資料模型與流程依賴的介面

pub mod model;
pub mod ports;
